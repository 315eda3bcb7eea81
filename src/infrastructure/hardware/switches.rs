//! Mode-switch sampling. Three independent switches, read once per control
//! tick; the selector turns the reading into a strategy.

use std::sync::{Arc, Mutex};

pub trait SwitchInput: Send {
    fn sample(&mut self) -> [bool; 3];
}

/// Jumpered switch bank with a fixed reading.
pub struct FixedSwitches([bool; 3]);

impl FixedSwitches {
    pub fn new(reading: [bool; 3]) -> Self {
        Self(reading)
    }
}

impl SwitchInput for FixedSwitches {
    fn sample(&mut self) -> [bool; 3] {
        self.0
    }
}

/// Shared-cell switch bank for externally driven input.
#[derive(Debug, Clone, Default)]
pub struct SharedSwitches {
    reading: Arc<Mutex<[bool; 3]>>,
}

impl SharedSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, reading: [bool; 3]) {
        *self.reading.lock().unwrap() = reading;
    }
}

impl SwitchInput for SharedSwitches {
    fn sample(&mut self) -> [bool; 3] {
        *self.reading.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_switches_reflect_the_latest_write() {
        let switches = SharedSwitches::new();
        let mut reader = switches.clone();
        assert_eq!(reader.sample(), [false; 3]);
        switches.set([true, false, true]);
        assert_eq!(reader.sample(), [true, false, true]);
    }
}
