// Protocol module - THE PACKETS
// Fixed-length command frames written to the lamp and notification frames read back

mod constants;
mod frame;
mod notification;

pub use constants::*;
pub use frame::{encode_command, CodecError, Command, CommandFrame};
pub use notification::{decode_notification, DecodeError, ResponseKind, StateSnapshot};
