// Notification Frames
// Decoding of the packets the lamp pushes on the notify characteristic
//
// Layout (big-endian): 2 header bytes (marker, response opcode), seven u8
// fields, one i16, seven padding bytes. 18 bytes in total.

use super::constants::{args, responses, FRAME_LEN, MAX_BRIGHTNESS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const FIELDS_OFFSET: usize = 2;
const FIELD_COUNT: usize = 7;
const WORD_OFFSET: usize = FIELDS_OFFSET + FIELD_COUNT;

/// Errors that can occur while decoding a notification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Truncated notification: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Unknown response opcode: 0x{0:02x}")]
    UnknownOpcode(u8),
}

/// Response types the lamp is known to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    Pair,
    State,
    Name,
    Version,
    Serial,
    Time,
}

impl ResponseKind {
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            responses::RES_PAIR => Some(Self::Pair),
            responses::RES_GETSTATE => Some(Self::State),
            responses::RES_GETNAME => Some(Self::Name),
            responses::RES_GETVER => Some(Self::Version),
            responses::RES_GETSERIAL => Some(Self::Serial),
            responses::RES_GETTIME => Some(Self::Time),
            _ => None,
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Pair => responses::RES_PAIR,
            Self::State => responses::RES_GETSTATE,
            Self::Name => responses::RES_GETNAME,
            Self::Version => responses::RES_GETVER,
            Self::Serial => responses::RES_GETSERIAL,
            Self::Time => responses::RES_GETTIME,
        }
    }
}

/// A decoded notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Which response this frame carries
    pub kind: ResponseKind,
    /// The seven single-byte fields, undecoded
    pub fields: [u8; FIELD_COUNT],
    /// The big-endian signed word following the fields
    pub value: i16,
    /// Power reported by a state response
    pub power: Option<bool>,
    /// Brightness reported by a state response, if within 0..=100
    pub brightness: Option<u8>,
}

impl StateSnapshot {
    pub fn opcode(&self) -> u8 {
        self.kind.opcode()
    }

    /// True when the frame reports power or brightness
    pub fn carries_state(&self) -> bool {
        self.power.is_some() || self.brightness.is_some()
    }
}

/// Decode one notification buffer. Bytes past the fixed length are ignored.
pub fn decode_notification(raw: &[u8]) -> Result<StateSnapshot, DecodeError> {
    if raw.len() < FRAME_LEN {
        return Err(DecodeError::Truncated {
            expected: FRAME_LEN,
            actual: raw.len(),
        });
    }

    let opcode = raw[1];
    let kind = ResponseKind::from_opcode(opcode).ok_or(DecodeError::UnknownOpcode(opcode))?;

    let mut fields = [0u8; FIELD_COUNT];
    fields.copy_from_slice(&raw[FIELDS_OFFSET..WORD_OFFSET]);
    let value = i16::from_be_bytes([raw[WORD_OFFSET], raw[WORD_OFFSET + 1]]);

    let (power, brightness) = match kind {
        ResponseKind::State => (decode_power(fields[0]), decode_brightness(fields[1])),
        _ => (None, None),
    };

    Ok(StateSnapshot {
        kind,
        fields,
        value,
        power,
        brightness,
    })
}

// Power uses the same byte values as the POWER command
fn decode_power(byte: u8) -> Option<bool> {
    match byte {
        args::POWER_ON => Some(true),
        args::POWER_OFF => Some(false),
        _ => None,
    }
}

fn decode_brightness(byte: u8) -> Option<u8> {
    (byte <= MAX_BRIGHTNESS).then_some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(opcode: u8, fields: [u8; 7], value: i16) -> Vec<u8> {
        let mut raw = vec![0x43, opcode];
        raw.extend_from_slice(&fields);
        raw.extend_from_slice(&value.to_be_bytes());
        raw.resize(FRAME_LEN, 0);
        raw
    }

    #[test]
    fn test_decode_state_response() {
        let raw = frame(0x45, [0x01, 70, 0, 0, 0, 0, 0], -2);
        let snapshot = decode_notification(&raw).unwrap();

        assert_eq!(snapshot.kind, ResponseKind::State);
        assert_eq!(snapshot.power, Some(true));
        assert_eq!(snapshot.brightness, Some(70));
        assert_eq!(snapshot.value, -2);
    }

    #[test]
    fn test_decode_big_endian_word() {
        let raw = frame(0x62, [0; 7], 0x0102);
        let snapshot = decode_notification(&raw).unwrap();

        assert_eq!(snapshot.value, 258);
        assert!(!snapshot.carries_state());
    }

    #[test]
    fn test_decode_ignores_out_of_range_brightness() {
        let raw = frame(0x45, [0x02, 200, 0, 0, 0, 0, 0], 0);
        let snapshot = decode_notification(&raw).unwrap();

        assert_eq!(snapshot.power, Some(false));
        assert_eq!(snapshot.brightness, None);
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert_eq!(
            decode_notification(&[]),
            Err(DecodeError::Truncated { expected: 18, actual: 0 })
        );
    }
}
