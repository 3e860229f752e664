mod common;
use common::*;
use neodk_lib::attribute::{encode_string_array, encode_utf8};
use neodk_lib::sink::StateChange;
use tokio::sync::mpsc;

fn dispatcher() -> Dispatcher<DeviceState, MemoryLogSink> {
    Dispatcher::new(DeviceState::default(), MemoryLogSink::default())
}

/// Assemble `stream` and dispatch every frame, returning the Acks produced.
fn run(dispatcher: &mut Dispatcher<DeviceState, MemoryLogSink>, stream: &[u8]) -> Vec<Ack> {
    let mut assembler = FrameAssembler::new();
    let mut acks = Vec::new();
    assembler.feed(stream, |frame| acks.extend(dispatcher.dispatch(&frame)));
    acks
}

#[test]
fn test_voltages_report() {
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &hex::decode(REPORT_VOLTAGES).unwrap());

    let power = dispatcher.state().power;
    assert_eq!(power.battery_v, 12.0);
    assert_eq!(power.capacitor_v, 5.0);
    assert_eq!(power.primary_current_a, 0.25);
    assert_eq!(
        acks,
        vec![Ack {
            service_type: ServiceType::Datagram,
            seq: 3
        }]
    );
    assert_eq!(hex::encode(acks[0].to_frame()), ACK_DATAGRAM_3);
    assert_eq!(dispatcher.log().lines, vec!["Vbat=12000 mV, Vcap=5000 mV, Ipri=250 mA"]);
}

#[test]
fn test_intensity_report() {
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &hex::decode(REPORT_INTENSITY_55).unwrap());
    assert_eq!(dispatcher.state().intensity, 55);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].seq, 2);
}

#[test]
fn test_pattern_reports() {
    let mut dispatcher = dispatcher();
    let names = encode_string_array(&["Waves", "Pulse"]).unwrap();
    let mut stream = report_frame(0, 10, AttributeId::AllPatternNames, &names).to_vec();
    let current = encode_utf8("Waves").unwrap();
    stream.extend_from_slice(&report_frame(1, 11, AttributeId::CurrentPatternName, &current));
    let box_name = encode_utf8("Bedroom").unwrap();
    stream.extend_from_slice(&report_frame(2, 12, AttributeId::BoxName, &box_name));

    let acks = run(&mut dispatcher, &stream);
    let seqs: Vec<u8> = acks.iter().map(|ack| ack.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);

    let state = dispatcher.state();
    assert_eq!(state.available_patterns, vec!["Waves", "Pulse"]);
    assert_eq!(state.current_pattern, "Waves");
    assert_eq!(state.box_name, "Bedroom");
}

#[test]
fn test_debug_text() {
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &hex::decode(DEBUG_HELLO).unwrap());
    assert_eq!(dispatcher.log().debug_lines, vec!["hello"]);
    assert_eq!(
        acks,
        vec![Ack {
            service_type: ServiceType::Debug,
            seq: 5
        }]
    );
}

#[test]
fn test_unknown_opcode_is_logged_and_acked() {
    let packet: Bytes =
        Datagram::new(1234, OpCode::WriteResponse, AttributeId::BoxName, Bytes::new()).into();
    let frame = build_frame(&packet, FrameType::Data, ServiceType::Datagram, 4).unwrap();

    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &frame);
    assert_eq!(acks.len(), 1);
    assert_eq!(dispatcher.log().lines, vec!["Transaction ID=1234, opcode=7"]);
    assert_eq!(*dispatcher.state(), DeviceState::default());
}

#[test]
fn test_unknown_attribute_is_logged() {
    let frame = report_frame(1, 5, AttributeId::Unknown(42), &[4, 1]);
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &frame);
    assert_eq!(acks.len(), 1, "the frame is still acknowledged");
    assert_eq!(dispatcher.log().lines, vec!["Unexpected attribute id: 42"]);
    assert_eq!(*dispatcher.state(), DeviceState::default());
}

#[test]
fn test_encoding_mismatch_leaves_state_untouched() {
    let frame = report_frame(1, 5, AttributeId::IntensityPercent, &encode_utf8("50").unwrap());
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &frame);
    assert_eq!(acks.len(), 1);
    assert_eq!(dispatcher.state().intensity, 0);
    assert!(dispatcher.log().lines.is_empty());
}

#[test]
fn test_short_datagram_is_dropped_but_acked() {
    let frame = build_frame(&[0; 5], FrameType::Data, ServiceType::Datagram, 6).unwrap();
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &frame);
    assert_eq!(acks.len(), 1);
    assert!(dispatcher.log().lines.is_empty());
}

#[test]
fn test_empty_data_frame_is_acked_not_routed() {
    let frame = build_frame(&[], FrameType::Data, ServiceType::Datagram, 6).unwrap();
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &frame);
    assert_eq!(
        acks,
        vec![Ack {
            service_type: ServiceType::Datagram,
            seq: 6
        }]
    );
    assert!(dispatcher.log().lines.is_empty());
    assert!(dispatcher.log().debug_lines.is_empty());
    assert_eq!(*dispatcher.state(), DeviceState::default());
}

#[test]
fn test_channel_sink_receives_changes() {
    let (tx, mut rx) = mpsc::unbounded_channel::<StateChange>();
    let mut dispatcher = Dispatcher::new(tx, MemoryLogSink::default());

    let mut assembler = FrameAssembler::new();
    let mut acks = Vec::new();
    assembler.feed(&hex::decode(REPORT_INTENSITY_55).unwrap(), |frame| {
        acks.extend(dispatcher.dispatch(&frame))
    });

    assert_eq!(acks.len(), 1);
    assert_eq!(rx.try_recv(), Ok(StateChange::Intensity(55)));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_ack_frames_are_recorded_not_acked() {
    let mut dispatcher = dispatcher();
    let acks = run(&mut dispatcher, &hex::decode(ACK_DATAGRAM_3).unwrap());
    assert!(acks.is_empty());
    assert_eq!(dispatcher.last_ack(), Some(3));
}

#[test]
fn test_sync_and_nak_are_not_acked() {
    let mut stream = build_frame(&[], FrameType::Sync, ServiceType::Datagram, 0).unwrap().to_vec();
    stream.extend_from_slice(&build_frame(&[], FrameType::Nak, ServiceType::Datagram, 1).unwrap());

    let mut dispatcher = dispatcher();
    assert!(run(&mut dispatcher, &stream).is_empty());
    assert_eq!(dispatcher.last_ack(), None);
}
