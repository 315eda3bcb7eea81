//! Quadrature encoder counts.
//!
//! The counters are updated on their own cadence by the sampling side;
//! the control core only ever reads them.

use std::sync::{Arc, Mutex};

pub trait EncoderCounter: Send + Sync {
    /// Cumulative signed counts, one per motor.
    fn counts(&self) -> [i64; 3];
}

/// Shared-cell encoder bank. The sampling task keeps a clone and writes;
/// the control loop reads.
#[derive(Debug, Clone, Default)]
pub struct SharedEncoders {
    counts: Arc<Mutex<[i64; 3]>>,
}

impl SharedEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, motor: usize, delta: i64) {
        if let Some(count) = self.counts.lock().unwrap().get_mut(motor) {
            *count += delta;
        }
    }

    pub fn set(&self, counts: [i64; 3]) {
        *self.counts.lock().unwrap() = counts;
    }
}

impl EncoderCounter for SharedEncoders {
    fn counts(&self) -> [i64; 3] {
        *self.counts.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_motor() {
        let encoders = SharedEncoders::new();
        encoders.add(0, 5);
        encoders.add(0, -2);
        encoders.add(2, 7);
        assert_eq!(encoders.counts(), [3, 0, 7]);
    }

    #[test]
    fn out_of_range_motor_is_ignored() {
        let encoders = SharedEncoders::new();
        encoders.add(3, 99);
        assert_eq!(encoders.counts(), [0; 3]);
    }
}
