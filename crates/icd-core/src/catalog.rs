//! Reference message definitions.
//!
//! Real deployments define their own message types from their ICD; these two
//! cover every field kind and are what the console binary registers by
//! default.
//!
//! Declared lengths count the payload plus one CRC byte, which is reserved
//! on the wire but not computed.

use crate::protocol::bit_field::BitField;
use crate::protocol::error::IcdError;
use crate::protocol::field::Field;
use crate::protocol::message::Message;

pub const TELEMETRY_ID: u8 = 0x01;
pub const COMMAND_ID: u8 = 0x02;

/// Periodic status frame: 22 payload bytes + 1 CRC byte.
///
/// # Errors
///
/// Only fails if the definition itself is inconsistent.
pub fn telemetry_message() -> Result<Message, IcdError> {
    let status = BitField::new(16)?
        .with_subfield("armed", 0, 1)?
        .with_subfield("mode", 1, 3)?
        .with_subfield("fault", 4, 6)?;

    Message::new("telemetry", TELEMETRY_ID, 23)
        .with_field("timestamp", Field::float(0.0))?
        .with_field("altitude", Field::float(0.0))?
        // 0.0 ..= 1.0 full scale
        .with_field("throttle", Field::scaled_u16(0.0, 1.0 / 65536.0, 0.0))?
        // -50.00 ..= 605.35 degC in 0.01 steps
        .with_field("temperature", Field::scaled_u16(20.0, 0.01, 50.0))?
        .with_field("status", Field::bits(status))
}

/// Operator command frame: 11 payload bytes + 1 CRC byte.
///
/// # Errors
///
/// Only fails if the definition itself is inconsistent.
pub fn command_message() -> Result<Message, IcdError> {
    let control = BitField::new(8)?
        .with_subfield("enable", 0, 1)?
        .with_subfield("channel", 1, 3)?
        .with_subfield("reset", 7, 1)?;

    Message::new("command", COMMAND_ID, 12)
        .with_field("setpoint", Field::float(0.0))?
        .with_field("gain", Field::scaled_u16(1.0, 0.001, 0.0))?
        .with_field("control", Field::bits(control))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_lengths_cover_payload_plus_crc() {
        for msg in [telemetry_message().unwrap(), command_message().unwrap()] {
            assert_eq!(
                usize::from(msg.declared_length()),
                msg.payload_len() + 1,
                "{} declared length out of sync with its fields",
                msg.name()
            );
        }
    }

    #[test]
    fn test_telemetry_temperature_initial_value() {
        let msg = telemetry_message().unwrap();
        assert!((msg.get("temperature").unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_ids_are_distinct() {
        assert_ne!(
            telemetry_message().unwrap().id(),
            command_message().unwrap().id()
        );
    }
}
