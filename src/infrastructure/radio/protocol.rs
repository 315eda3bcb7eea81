//! Wire-level definitions for the remote IMU peripheral.
//!
//! The peripheral advertises one service with one characteristic that
//! notifies orientation quaternions: exactly 16 bytes, four little-endian
//! IEEE-754 floats in the order `w, x, y, z`. Anything else is rejected
//! without touching the stored sample.

use crate::domain::quaternion::Quaternion;
use crate::error::DecodeError;
use anyhow::Result;
use std::fmt;

/// Service UUID the IMU peripheral advertises. Must match the peripheral's
/// firmware; new UUIDs can be generated at https://www.uuidgenerator.net/
pub const SERVICE_UUID: &str = "da2aa210-e2ab-4d96-8d94-8536ec5a2728";

/// Characteristic streaming orientation quaternions.
pub const IMU_CHARACTERISTIC_UUID: &str = "72b9a4be-85fe-4cd5-ae42-f32414542c5a";

/// Notification payload length: four little-endian f32.
pub const QUATERNION_PAYLOAD_LEN: usize = 16;

/// A 128-bit attribute identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid(u128);

impl Uuid {
    /// Parse the usual hex-and-hyphen form.
    pub fn parse(uuid_str: &str) -> Result<Self> {
        let hex = uuid_str.replace('-', "");
        if hex.len() != 32 {
            anyhow::bail!("Invalid UUID format: {uuid_str}");
        }
        let value = u128::from_str_radix(&hex, 16)?;
        Ok(Self(value))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (b >> 96) as u32,
            (b >> 80) as u16,
            (b >> 64) as u16,
            (b >> 48) as u16,
            b & 0xffff_ffff_ffff
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Decode a notification payload into a quaternion.
pub fn decode_quaternion(payload: &[u8]) -> Result<Quaternion, DecodeError> {
    if payload.len() != QUATERNION_PAYLOAD_LEN {
        return Err(DecodeError::BadLength(payload.len()));
    }

    let float_at = |offset: usize| {
        f32::from_le_bytes([
            payload[offset],
            payload[offset + 1],
            payload[offset + 2],
            payload[offset + 3],
        ])
    };
    Ok(Quaternion::new(
        float_at(0),
        float_at(4),
        float_at(8),
        float_at(12),
    ))
}

/// Encode a quaternion the way the peripheral does; used by the simulated
/// peripheral and the tests.
pub fn encode_quaternion(quat: Quaternion) -> [u8; QUATERNION_PAYLOAD_LEN] {
    let mut payload = [0u8; QUATERNION_PAYLOAD_LEN];
    payload[0..4].copy_from_slice(&quat.w.to_le_bytes());
    payload[4..8].copy_from_slice(&quat.x.to_le_bytes());
    payload[8..12].copy_from_slice(&quat.y.to_le_bytes());
    payload[12..16].copy_from_slice(&quat.z.to_le_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uuid_accepts_the_configured_ids() {
        let service = Uuid::parse(SERVICE_UUID).unwrap();
        assert_eq!(service.to_string(), SERVICE_UUID);
        assert!(Uuid::parse(IMU_CHARACTERISTIC_UUID).is_ok());
    }

    #[test]
    fn parse_uuid_rejects_malformed_input() {
        assert!(Uuid::parse("not-a-uuid").is_err());
        assert!(Uuid::parse("da2aa210").is_err());
        assert!(Uuid::parse("zz2aa210-e2ab-4d96-8d94-8536ec5a2728").is_err());
    }

    #[test]
    fn identity_bytes_decode_to_identity() {
        let mut payload = [0u8; 16];
        payload[0..4].copy_from_slice(&1.0f32.to_le_bytes());
        let quat = decode_quaternion(&payload).unwrap();
        assert_eq!(quat, Quaternion::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn decode_preserves_exact_bit_patterns() {
        let original = Quaternion::new(0.70710677, -0.0, 3.1e-41, -0.5);
        let decoded = decode_quaternion(&encode_quaternion(original)).unwrap();
        assert_eq!(decoded.w.to_bits(), original.w.to_bits());
        assert_eq!(decoded.x.to_bits(), original.x.to_bits());
        assert_eq!(decoded.y.to_bits(), original.y.to_bits());
        assert_eq!(decoded.z.to_bits(), original.z.to_bits());
    }

    #[test]
    fn wrong_length_payloads_are_rejected() {
        assert_eq!(decode_quaternion(&[0u8; 15]), Err(DecodeError::BadLength(15)));
        assert_eq!(decode_quaternion(&[0u8; 17]), Err(DecodeError::BadLength(17)));
        assert_eq!(decode_quaternion(&[]), Err(DecodeError::BadLength(0)));
    }
}
