mod common;
use common::*;
use neodk_lib::frame::{has_valid_header, is_intact};
use proptest::prelude::*;

#[test]
fn test_frame_try_from_bytes() {
    let frame = Frame::try_from(hex_to_bytes(DEBUG_HELLO)).expect("Failed to parse frame");
    assert_eq!(frame.frame_type(), FrameType::Data);
    assert_eq!(frame.service_type(), ServiceType::Debug);
    assert_eq!(frame.header.seq_nr(), 5);
    assert_eq!(frame.payload.as_ref(), b"hello");
}

#[test]
fn test_frame_length_mismatch() {
    let mut bytes = hex::decode(DEBUG_HELLO).unwrap();
    bytes.pop();
    let err = Frame::try_from(Bytes::from(bytes)).unwrap_err();
    assert!(matches!(err, NeoError::InvalidFrame(_)), "got {err:?}");
}

#[test]
fn test_request_vector() {
    let frame = Frame::try_from(hex_to_bytes(READ_ALL_PATTERNS)).unwrap();
    let datagram = Datagram::try_from(frame.payload).unwrap();
    assert_eq!(datagram.transaction_id, 1959);
    assert_eq!(datagram.opcode, OpCode::ReadRequest);
    assert_eq!(datagram.attribute_id, AttributeId::AllPatternNames);
}

proptest! {
    #[test]
    fn built_frames_parse_back(
        payload in proptest::collection::vec(any::<u8>(), 0..=512),
        datagram in any::<bool>(),
        sync in any::<bool>(),
        seq in 0u8..8,
    ) {
        let service_type = if datagram { ServiceType::Datagram } else { ServiceType::Debug };
        let frame_type = if sync { FrameType::Sync } else { FrameType::Data };
        let bytes = build_frame(&payload, frame_type, service_type, seq).unwrap();

        prop_assert_eq!(bytes.len(), 8 + payload.len());
        prop_assert!(has_valid_header(&bytes));
        prop_assert!(is_intact(&bytes));

        let frame = Frame::try_from(bytes).unwrap();
        prop_assert_eq!(frame.frame_type(), frame_type);
        prop_assert_eq!(frame.service_type(), service_type);
        prop_assert_eq!(frame.header.seq_nr(), seq);
        prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn ack_frames_carry_ack_nr(seq in 0u8..8, datagram in any::<bool>()) {
        let service_type = if datagram { ServiceType::Datagram } else { ServiceType::Debug };
        let ack = build_ack(service_type, seq);
        let header = FrameHeader::parse(&ack).unwrap();
        prop_assert_eq!(header.frame_type(), FrameType::Ack);
        prop_assert_eq!(header.service_type(), service_type);
        prop_assert_eq!(header.ack_nr(), seq);
        prop_assert!(header.is_ack());
        prop_assert_eq!(header.payload_size(), 0);
    }

    #[test]
    fn any_assembled_frame_survives_the_assembler(
        payload in proptest::collection::vec(any::<u8>(), 0..=512),
        seq in 0u8..8,
    ) {
        let bytes = build_frame(&payload, FrameType::Data, ServiceType::Datagram, seq).unwrap();
        let frames = assemble_all(&bytes);
        prop_assert_eq!(frames, vec![bytes.to_vec()]);
    }
}
