//! Single-slot store for the latest remote orientation sample.
//!
//! Written by the notification path, read by the control loop; the two run
//! on different tasks, so the slot is a mutex-guarded cell. The producer is
//! expected to send unit quaternions and the reader does not re-normalize.
//! No timestamp accompanies a sample, so readers cannot tell a fresh value
//! from a stale one; they only see the last value and whether one ever
//! arrived.

use crate::domain::quaternion::Quaternion;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Slot {
    quat: Quaternion,
    valid: bool,
    rejections: u64,
}

/// Shared handle to the orientation slot.
#[derive(Debug, Clone)]
pub struct OrientationStore {
    inner: Arc<Mutex<Slot>>,
}

impl OrientationStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Slot {
                quat: Quaternion::IDENTITY,
                valid: false,
                rejections: 0,
            })),
        }
    }

    /// Overwrite the slot and mark it valid.
    pub fn set(&self, quat: Quaternion) {
        let mut slot = self.inner.lock().unwrap();
        slot.quat = quat;
        slot.valid = true;
    }

    /// Latest sample and whether one has ever been received. Identity until
    /// the first valid notification.
    pub fn get(&self) -> (Quaternion, bool) {
        let slot = self.inner.lock().unwrap();
        (slot.quat, slot.valid)
    }

    /// Count a discarded malformed payload. The stored sample is untouched.
    pub fn record_rejection(&self) {
        self.inner.lock().unwrap().rejections += 1;
    }

    pub fn rejections(&self) -> u64 {
        self.inner.lock().unwrap().rejections
    }
}

impl Default for OrientationStore {
    fn default() -> Self {
        Self::new()
    }
}
