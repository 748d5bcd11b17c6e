// Command Frames
// Encoding of the fixed 18-byte packets written to the control characteristic

use super::constants::{args, opcodes, COMMAND_STX, FRAME_LEN, MAX_ARGS, MAX_BRIGHTNESS};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while building or parsing command frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    #[error("Invalid start marker: 0x{0:02x}")]
    InvalidStartMarker(u8),
}

// ============================================================================
// COMMAND FRAME
// ============================================================================

/// One outbound packet: `[STX, opcode, args..., zero padding]`, always 18 bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Build a frame from an opcode and up to 16 argument bytes
    pub fn encode(opcode: u8, args: &[u8]) -> Result<Self, CodecError> {
        if args.len() > MAX_ARGS {
            return Err(CodecError::InvalidArgument(format!(
                "{} argument bytes do not fit in a {}-byte frame (max {})",
                args.len(),
                FRAME_LEN,
                MAX_ARGS
            )));
        }

        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = COMMAND_STX;
        bytes[1] = opcode;
        bytes[2..2 + args.len()].copy_from_slice(args);
        Ok(Self(bytes))
    }

    /// Parse a frame previously produced by [`CommandFrame::encode`]
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let bytes: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| CodecError::InvalidFrameLength {
            expected: FRAME_LEN,
            actual: bytes.len(),
        })?;
        if bytes[0] != COMMAND_STX {
            return Err(CodecError::InvalidStartMarker(bytes[0]));
        }
        Ok(Self(bytes))
    }

    pub fn opcode(&self) -> u8 {
        self.0[1]
    }

    /// Argument area including zero padding (16 bytes)
    pub fn args(&self) -> &[u8] {
        &self.0[2..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame({})", self.to_hex())
    }
}

/// Free-function form of [`CommandFrame::encode`]
pub fn encode_command(opcode: u8, args: &[u8]) -> Result<CommandFrame, CodecError> {
    CommandFrame::encode(opcode, args)
}

// ============================================================================
// TYPED COMMANDS
// ============================================================================

/// Commands with a confirmed wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Vendor pairing handshake
    Pair,
    /// Switch the lamp on (`true`) or off (`false`)
    Power(bool),
    /// Brightness in percent, 0..=100
    Brightness(u8),
    /// Ask the lamp to report its state
    GetState,
    GetName,
    GetVersion,
    GetSerial,
}

impl Command {
    /// Brightness command, rejecting levels above 100
    pub fn brightness(level: u8) -> Result<Self, CodecError> {
        if level > MAX_BRIGHTNESS {
            return Err(CodecError::InvalidArgument(format!(
                "brightness {} out of range 0..={}",
                level, MAX_BRIGHTNESS
            )));
        }
        Ok(Self::Brightness(level))
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Pair => opcodes::PAIR,
            Self::Power(_) => opcodes::POWER,
            Self::Brightness(_) => opcodes::BRIGHTNESS,
            Self::GetState => opcodes::GETSTATE,
            Self::GetName => opcodes::GETNAME,
            Self::GetVersion => opcodes::GETVER,
            Self::GetSerial => opcodes::GETSERIAL,
        }
    }

    /// Encode into a frame
    pub fn to_frame(&self) -> Result<CommandFrame, CodecError> {
        match *self {
            Self::Pair => CommandFrame::encode(opcodes::PAIR, &[args::PAIR_ON]),
            Self::Power(on) => {
                let arg = if on { args::POWER_ON } else { args::POWER_OFF };
                CommandFrame::encode(opcodes::POWER, &[arg])
            }
            Self::Brightness(level) => {
                Self::brightness(level)?;
                CommandFrame::encode(opcodes::BRIGHTNESS, &[level])
            }
            Self::GetState => CommandFrame::encode(opcodes::GETSTATE, &[args::GETSTATE_SEC]),
            Self::GetName | Self::GetVersion | Self::GetSerial => {
                CommandFrame::encode(self.opcode(), &[])
            }
        }
    }
}
