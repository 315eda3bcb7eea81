//! Error taxonomy for the controller core.
//!
//! Link errors are transient: the link falls back to scanning and retries on
//! the next matching advertisement. Actuator configuration errors are fatal
//! for actuator bring-up and are reported to the caller, which decides
//! whether to halt. The core itself never terminates the process.

use thiserror::Error;

/// Errors surfaced by the radio backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("radio has not been powered on")]
    NotPoweredOn,
    #[error("connection to {address:#x} failed")]
    ConnectFailed { address: u64 },
    #[error("no client exists for peer {address:#x}")]
    UnknownClient { address: u64 },
    #[error("subscribe request was rejected")]
    SubscribeRejected,
}

/// Errors from the wireless link state machine.
///
/// Everything except `AlreadyInitialized` is non-fatal; the link restarts
/// discovery and waits for the next advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("wireless link is already initialized")]
    AlreadyInitialized,
    #[error("no peripheral recorded to connect to")]
    NoPeer,
    #[error("maximum concurrent clients reached")]
    MaxClients,
    #[error("radio operation failed: {0}")]
    Radio(#[from] RadioError),
    #[error("peer does not expose the configured service")]
    ServiceMissing,
    #[error("peer does not expose the configured characteristic")]
    CharacteristicMissing,
    #[error("characteristic does not support read")]
    ReadUnsupported,
    #[error("subscribing to notifications failed")]
    SubscribeFailed,
}

/// Rejection reasons for inbound notification payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected a 16-byte quaternion payload, got {0} bytes")]
    BadLength(usize),
}

/// Fatal actuator configuration errors, caught at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("motor {motor} pin {pin} is not a valid output pin")]
    InvalidPin { motor: usize, pin: u8 },
    #[error("pwm frequency {0} Hz exceeds the 40 MHz maximum")]
    InvalidFrequency(u32),
    #[error("pwm resolution {0} is outside 1..=16 bits")]
    InvalidResolution(u8),
}
