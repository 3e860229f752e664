mod common;
use common::*;
use neodk_lib::attribute::{
    AttributeReport, BoxPower, ReportSkip, decode_array, decode_report, decode_utf8, descriptor,
    encode_bytes, encode_string_array, encode_uint1, encode_utf8,
};
use num_enum::FromPrimitive;

#[test]
fn test_encode_utf8() {
    let encoded = encode_utf8("Waves").unwrap();
    assert_eq!(encoded.as_ref(), &[12, 5, 87, 97, 118, 101, 115]);
    assert_eq!(encode_utf8("").unwrap().as_ref(), &[12, 0]);
}

#[test]
fn test_encode_utf8_length_limit() {
    assert_eq!(encode_utf8(&"x".repeat(255)).unwrap().len(), 257);
    let err = encode_utf8(&"x".repeat(256)).unwrap_err();
    assert!(matches!(err, NeoError::StringTooLong(256)));
}

#[test]
fn test_encode_uint1_truncates() {
    assert_eq!(encode_uint1(42).as_ref(), &[4, 42]);
    assert_eq!(encode_uint1(0x1FF).as_ref(), &[4, 0xFF]);
}

#[test]
fn test_encode_bytes() {
    assert_eq!(encode_bytes(&[1, 2, 3]).unwrap().as_ref(), &[16, 3, 1, 2, 3]);
}

#[test]
fn test_encode_string_array() {
    let encoded = encode_string_array(&["A", "Bc"]).unwrap();
    assert_eq!(encoded.as_ref(), &[22, 12, 1, b'A', 12, 2, b'B', b'c', 24]);
}

#[test]
fn test_decode_utf8_clamps_length() {
    assert_eq!(decode_utf8(&[12, 5, 87, 97, 118, 101, 115]), Some(("Waves".to_string(), 7)));
    // Announces 10 bytes, only 3 present
    assert_eq!(decode_utf8(&[12, 10, b'a', b'b', b'c']), Some(("abc".to_string(), 5)));
    assert_eq!(decode_utf8(&[4, 1]), None);
    assert_eq!(decode_utf8(&[12]), None);
}

#[test]
fn test_decode_array() {
    let encoded = encode_string_array(&["Waves", "Pulse", "Tease"]).unwrap();
    let (names, consumed) = decode_array(&encoded[1..]);
    assert_eq!(names, vec!["Waves", "Pulse", "Tease"]);
    assert_eq!(consumed, encoded.len() - 1, "trailing EndOfContainer is consumed");
}

#[test]
fn test_decode_array_stops_at_other_tag() {
    let (names, consumed) = decode_array(&[12, 1, b'a', 4, 7, 12, 1, b'b']);
    assert_eq!(names, vec!["a"]);
    assert_eq!(consumed, 3);
}

#[test]
fn test_decode_array_truncated_element() {
    let (names, consumed) = decode_array(&[12, 1, b'a', 12, 9, b'b']);
    assert_eq!(names, vec!["a"]);
    assert_eq!(consumed, 3);
}

#[test]
fn test_decode_voltages() {
    let body = [16, 6, 0xE0, 0x2E, 0x88, 0x13, 0xFA, 0x00];
    let report = decode_report(AttributeId::Voltages, &body).unwrap();
    assert_eq!(
        report,
        AttributeReport::Voltages(BoxPower {
            battery_v: 12.0,
            capacitor_v: 5.0,
            primary_current_a: 0.25,
        })
    );
    assert_eq!(report.to_string(), "Vbat=12000 mV, Vcap=5000 mV, Ipri=250 mA");
}

#[test]
fn test_decode_short_voltages_is_malformed() {
    let skip = decode_report(AttributeId::Voltages, &[16, 4, 0xE0, 0x2E, 0x88, 0x13]).unwrap_err();
    assert_eq!(skip, ReportSkip::Malformed(AttributeId::Voltages));
}

#[test]
fn test_decode_play_state() {
    let cases = [
        (0, PlayState::Undefined),
        (1, PlayState::Stopped),
        (2, PlayState::Paused),
        (3, PlayState::Playing),
        (4, PlayState::Undefined),
        (200, PlayState::Undefined),
    ];
    for (index, expected) in cases {
        let report = decode_report(AttributeId::PlayPauseStop, &[4, index]).unwrap();
        assert_eq!(report, AttributeReport::PlayState(expected), "index {index}");
    }
}

#[test]
fn test_decode_play_state_from_command_string() {
    let report = decode_report(AttributeId::PlayPauseStop, &encode_utf8("pause").unwrap()).unwrap();
    assert_eq!(report, AttributeReport::PlayState(PlayState::Paused));
    let report =
        decode_report(AttributeId::PlayPauseStop, &encode_utf8("rewind").unwrap()).unwrap();
    assert_eq!(report, AttributeReport::PlayState(PlayState::Undefined));
}

#[test]
fn test_tag_mismatch_is_skipped() {
    // Intensity must be UnsignedInt1
    let skip =
        decode_report(AttributeId::IntensityPercent, &encode_utf8("50").unwrap()).unwrap_err();
    assert!(matches!(
        skip,
        ReportSkip::UnexpectedEncoding {
            attribute: AttributeId::IntensityPercent,
            actual: Encoding::Utf8OneLen,
            ..
        }
    ));
}

#[test]
fn test_unknown_attribute_and_empty_body() {
    assert_eq!(
        decode_report(AttributeId::from_primitive(99), &[4, 1]).unwrap_err(),
        ReportSkip::UnknownAttribute(99)
    );
    assert_eq!(
        decode_report(AttributeId::BoxName, &[]).unwrap_err(),
        ReportSkip::Empty(AttributeId::BoxName)
    );
}

#[test]
fn test_registry_covers_known_attributes() {
    for id in [
        AttributeId::Voltages,
        AttributeId::AllPatternNames,
        AttributeId::CurrentPatternName,
        AttributeId::IntensityPercent,
        AttributeId::PlayPauseStop,
        AttributeId::BoxName,
    ] {
        assert!(descriptor(id).is_some(), "{id} has no descriptor");
    }
}

#[test]
fn test_apply_reports_to_state() {
    let mut state = DeviceState::default();
    for (id, body) in [
        (AttributeId::AllPatternNames, encode_string_array(&["Waves", "Pulse"]).unwrap()),
        (AttributeId::CurrentPatternName, encode_utf8("Pulse").unwrap()),
        (AttributeId::IntensityPercent, encode_uint1(30)),
        (AttributeId::PlayPauseStop, encode_uint1(3)),
        (AttributeId::BoxName, encode_utf8("NeoDK").unwrap()),
    ] {
        decode_report(id, &body).unwrap().apply(&mut state);
    }
    assert_eq!(state.available_patterns, vec!["Waves", "Pulse"]);
    assert_eq!(state.current_pattern, "Pulse");
    assert_eq!(state.intensity, 30);
    assert_eq!(state.play_state, PlayState::Playing);
    assert_eq!(state.box_name, "NeoDK");
}

#[test]
fn test_play_command_strings() {
    assert_eq!(PlayCommand::Play.to_string(), "play");
    assert_eq!(PlayCommand::Pause.to_string(), "pause");
    assert_eq!(PlayCommand::Stop.to_string(), "stop");
    assert_eq!(PlayCommand::parse("stop"), Some(PlayCommand::Stop));
    assert_eq!(PlayCommand::parse("Stop"), None);
}
