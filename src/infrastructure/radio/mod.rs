//! Wireless Link Module
//!
//! Keeps the connection to the remote IMU peripheral alive and the
//! orientation store fresh.
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs and the 16-byte quaternion payload codec
//! - [`stack`] - radio backend trait, events, and the simulated backend
//! - [`link`] - the reconnect-forever state machine

pub mod link;
pub mod protocol;
pub mod stack;

pub use link::{LinkConfig, WirelessLink};
