// Wire Constants
// GATT identifiers, opcodes and argument bytes understood by the lamp firmware

use uuid::Uuid;

/// Characteristic the lamp pushes notifications on
pub const NOTIFY_UUID: Uuid = Uuid::from_u128(0x8f65073d_9f57_4aaa_afea_397d19d5bbeb);

/// Characteristic command frames are written to
pub const CONTROL_UUID: Uuid = Uuid::from_u128(0xaa7d3f34_2d4f_41e0_807f_52fbf8cf7443);

/// First byte of every command frame
pub const COMMAND_STX: u8 = 0x43;

/// Length of every command and notification frame
pub const FRAME_LEN: usize = 18;

/// Room left for arguments after the start marker and opcode
pub const MAX_ARGS: usize = FRAME_LEN - 2;

/// Highest brightness the lamp accepts (percent)
pub const MAX_BRIGHTNESS: u8 = 100;

/// Command opcodes (byte 1 of a command frame)
pub mod opcodes {
    pub const PAIR: u8 = 0x67;
    pub const POWER: u8 = 0x40;
    pub const COLOR: u8 = 0x41;
    pub const RGB: u8 = 0x41;
    pub const BRIGHTNESS: u8 = 0x42;
    pub const TEMP: u8 = 0x43;
    pub const GETSTATE: u8 = 0x44;
    pub const GETNAME: u8 = 0x52;
    pub const GETVER: u8 = 0x5C;
    pub const GETSERIAL: u8 = 0x5E;
}

/// Argument bytes for the opcodes that take one
pub mod args {
    pub const PAIR_ON: u8 = 0x02;
    pub const POWER_ON: u8 = 0x01;
    pub const POWER_OFF: u8 = 0x02;
    pub const GETSTATE_SEC: u8 = 0x02;
}

/// Response opcodes seen in notification frames (byte 1)
pub mod responses {
    pub const RES_PAIR: u8 = 0x63;
    pub const RES_GETSTATE: u8 = 0x45;
    pub const RES_GETNAME: u8 = 0x53;
    pub const RES_GETVER: u8 = 0x5D;
    pub const RES_GETSERIAL: u8 = 0x5F;
    pub const RES_GETTIME: u8 = 0x62;
}
