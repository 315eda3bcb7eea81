use serde::{Deserialize, Serialize};

/// Identity of a discovered remote peripheral, recorded when a matching
/// advertisement arrives and held until disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralHandle {
    pub address: u64,
    pub local_name: String,
}

/// Lifecycle of the wireless link.
///
/// `Connected` is reachable only after the service lookup, characteristic
/// lookup, and (when the peer supports it) notification subscription all
/// succeed. `Disconnected` always falls back to `Scanning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Scanning,
    Connecting,
    Subscribing,
    Connected,
    Disconnected,
}

/// Scan parameters fixed at initialize time and reused verbatim on every
/// rescan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Scan duration in milliseconds; 0 scans indefinitely.
    pub duration_ms: u32,
    pub window: u16,
    pub interval: u16,
}

/// Which control strategy the selector chose for this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Dbt2,
    PathFollowing,
    Joystick,
    Sentient,
}

/// One signed duty command per motor; sign selects direction, magnitude is
/// the duty value, bounded by the actuator's resolution.
pub type MotorCommand = [i16; 3];
