// Protocol Tests
// Tests for command frame encoding and notification decoding

use candela::protocol::{
    decode_notification, encode_command, opcodes, responses, CodecError, Command, CommandFrame,
    DecodeError, ResponseKind, COMMAND_STX, CONTROL_UUID, FRAME_LEN, MAX_ARGS, NOTIFY_UUID,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn padded(prefix: &[u8]) -> Vec<u8> {
    let mut bytes = prefix.to_vec();
    bytes.resize(FRAME_LEN, 0);
    bytes
}

fn notification(opcode: u8, fields: [u8; 7], value: i16) -> Vec<u8> {
    let mut raw = vec![COMMAND_STX, opcode];
    raw.extend_from_slice(&fields);
    raw.extend_from_slice(&value.to_be_bytes());
    raw.resize(FRAME_LEN, 0);
    raw
}

// ============================================================================
// WIRE CONSTANTS
// ============================================================================

#[test]
fn test_gatt_uuids() {
    assert_eq!(NOTIFY_UUID.to_string(), "8f65073d-9f57-4aaa-afea-397d19d5bbeb");
    assert_eq!(CONTROL_UUID.to_string(), "aa7d3f34-2d4f-41e0-807f-52fbf8cf7443");
}

#[test]
fn test_frame_geometry() {
    assert_eq!(COMMAND_STX, 0x43);
    assert_eq!(FRAME_LEN, 18);
    assert_eq!(MAX_ARGS, 16);
}

// ============================================================================
// COMMAND ENCODING
// ============================================================================

#[test]
fn test_encode_every_arg_length() {
    for len in 0..=MAX_ARGS {
        let args = vec![0xAB; len];
        let frame = encode_command(0x40, &args).unwrap();

        assert_eq!(frame.as_bytes().len(), FRAME_LEN);
        assert_eq!(frame.as_bytes()[0], 0x43);
        assert_eq!(&frame.args()[..len], args.as_slice());
        assert!(frame.args()[len..].iter().all(|b| *b == 0));
    }
}

#[test]
fn test_encode_rejects_seventeen_args() {
    let result = encode_command(0x40, &[1u8; 17]);
    assert!(matches!(result, Err(CodecError::InvalidArgument(_))));
}

#[test]
fn test_typed_commands_match_wire_format() {
    let cases = [
        (Command::Pair, padded(&[0x43, 0x67, 0x02])),
        (Command::Power(true), padded(&[0x43, 0x40, 0x01])),
        (Command::Power(false), padded(&[0x43, 0x40, 0x02])),
        (Command::Brightness(70), padded(&[0x43, 0x42, 0x46])),
        (Command::GetState, padded(&[0x43, 0x44, 0x02])),
        (Command::GetName, padded(&[0x43, 0x52])),
        (Command::GetVersion, padded(&[0x43, 0x5C])),
        (Command::GetSerial, padded(&[0x43, 0x5E])),
    ];

    for (command, expected) in cases {
        let frame = command.to_frame().unwrap();
        assert_eq!(frame.as_bytes(), expected.as_slice(), "{:?}", command);
        assert_eq!(frame.opcode(), command.opcode());
    }
}

#[test]
fn test_brightness_bounds() {
    assert_eq!(Command::brightness(0), Ok(Command::Brightness(0)));
    assert_eq!(Command::brightness(100), Ok(Command::Brightness(100)));
    assert!(matches!(Command::brightness(101), Err(CodecError::InvalidArgument(_))));
}

#[test]
fn test_parse_recovers_opcode_and_args() {
    for opcode in [opcodes::POWER, opcodes::BRIGHTNESS, opcodes::COLOR, opcodes::TEMP] {
        let args = [0x10, 0x20, 0x30];
        let encoded = encode_command(opcode, &args).unwrap();
        let parsed = CommandFrame::parse(encoded.as_bytes()).unwrap();

        assert_eq!(parsed, encoded);
        assert_eq!(parsed.opcode(), opcode);
        assert_eq!(&parsed.args()[..3], &args);
    }
}

#[test]
fn test_parse_rejects_bad_frames() {
    assert_eq!(
        CommandFrame::parse(&[0x43, 0x40]),
        Err(CodecError::InvalidFrameLength { expected: 18, actual: 2 })
    );
    assert_eq!(
        CommandFrame::parse(&padded(&[0x44, 0x40])),
        Err(CodecError::InvalidStartMarker(0x44))
    );
}

// ============================================================================
// NOTIFICATION DECODING
// ============================================================================

#[test]
fn test_decode_known_response_kinds() {
    let kinds = [
        (responses::RES_PAIR, ResponseKind::Pair),
        (responses::RES_GETSTATE, ResponseKind::State),
        (responses::RES_GETNAME, ResponseKind::Name),
        (responses::RES_GETVER, ResponseKind::Version),
        (responses::RES_GETSERIAL, ResponseKind::Serial),
        (responses::RES_GETTIME, ResponseKind::Time),
    ];

    for (opcode, kind) in kinds {
        let snapshot = decode_notification(&notification(opcode, [0; 7], 0)).unwrap();
        assert_eq!(snapshot.kind, kind);
        assert_eq!(snapshot.opcode(), opcode);
    }
}

#[test]
fn test_decode_fixed_field_offsets() {
    let raw = notification(0x45, [0x01, 55, 3, 4, 5, 6, 7], i16::MIN);
    let snapshot = decode_notification(&raw).unwrap();

    assert_eq!(snapshot.fields, [0x01, 55, 3, 4, 5, 6, 7]);
    assert_eq!(snapshot.value, i16::MIN);
    assert_eq!(snapshot.power, Some(true));
    assert_eq!(snapshot.brightness, Some(55));
}

#[test]
fn test_decode_non_state_response_has_no_state() {
    let raw = notification(0x53, [0x01, 55, 0, 0, 0, 0, 0], 0);
    let snapshot = decode_notification(&raw).unwrap();

    assert_eq!(snapshot.power, None);
    assert_eq!(snapshot.brightness, None);
    assert!(!snapshot.carries_state());
}

#[test]
fn test_decode_truncated_buffers() {
    let full = notification(0x45, [0x01, 50, 0, 0, 0, 0, 0], 0);

    for len in 0..FRAME_LEN {
        assert_eq!(
            decode_notification(&full[..len]),
            Err(DecodeError::Truncated { expected: 18, actual: len })
        );
    }
}

#[test]
fn test_decode_unknown_opcode() {
    let raw = notification(0x99, [0; 7], 0);
    assert_eq!(decode_notification(&raw), Err(DecodeError::UnknownOpcode(0x99)));
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut raw = notification(0x45, [0x02, 10, 0, 0, 0, 0, 0], 7);
    raw.extend_from_slice(&[0xFF; 4]);
    let snapshot = decode_notification(&raw).unwrap();

    assert_eq!(snapshot.power, Some(false));
    assert_eq!(snapshot.brightness, Some(10));
    assert_eq!(snapshot.value, 7);
}
