//! Runs a session against an in-memory box that answers read requests.
//!
//! RUST_LOG=debug cargo run -p neodk-lib --example simulated_box

use bytes::Bytes;
use neodk_lib::attribute::{encode_bytes, encode_string_array, encode_uint1, encode_utf8};
use neodk_lib::frame::{FrameType, ServiceType, build_ack, build_frame};
use neodk_lib::packet::{AttributeId, Datagram, OpCode};
use neodk_lib::sink::TracingLogSink;
use neodk_lib::transport::{IoReader, IoWriter};
use neodk_lib::{DeviceState, FrameAssembler, NeoError, Session, SessionConfig};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn attribute_value(attribute_id: AttributeId) -> Result<Option<Bytes>, NeoError> {
    let value = match attribute_id {
        AttributeId::Voltages => encode_bytes(&[0xE0, 0x2E, 0x88, 0x13, 0xFA, 0x00])?,
        AttributeId::AllPatternNames => encode_string_array(&["Waves", "Pulse", "Tease"])?,
        AttributeId::CurrentPatternName => encode_utf8("Waves")?,
        AttributeId::IntensityPercent => encode_uint1(35),
        AttributeId::PlayPauseStop => encode_uint1(1),
        AttributeId::BoxName => encode_utf8("Simulated")?,
        AttributeId::Unknown(_) => return Ok(None),
    };
    Ok(Some(value))
}

/// Acks every Data frame and answers reads and subscribes with a report.
async fn run_box(mut stream: DuplexStream) -> Result<(), NeoError> {
    let mut assembler = FrameAssembler::new();
    let mut seq = 0u8;
    let mut buf = [0u8; 256];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        let mut replies = Vec::new();
        assembler.feed(&buf[..n], |frame| {
            if frame.frame_type() != FrameType::Data {
                return;
            }
            replies.push(Ok(build_ack(frame.service_type(), frame.header.seq_nr())));
            if frame.service_type() != ServiceType::Datagram {
                return;
            }
            let Ok(request) = Datagram::try_from(Bytes::copy_from_slice(frame.payload())) else {
                return;
            };
            if !matches!(request.opcode, OpCode::ReadRequest | OpCode::SubscribeRequest) {
                return;
            }
            let report = match attribute_value(request.attribute_id) {
                Ok(Some(value)) => value,
                Ok(None) => return,
                Err(e) => {
                    replies.push(Err(e));
                    return;
                }
            };
            let packet: Bytes = Datagram::new(
                request.transaction_id,
                OpCode::ReportData,
                request.attribute_id,
                report,
            )
            .into();
            replies.push(build_frame(&packet, FrameType::Data, ServiceType::Datagram, seq));
            seq = (seq + 1) % 8;
        });
        for reply in replies {
            stream.write_all(&reply?).await?;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (host, device) = tokio::io::duplex(1024);
    let simulator = tokio::spawn(run_box(device));

    let (reader, writer) = tokio::io::split(host);
    let (state_tx, mut state_rx) = watch::channel(DeviceState::default());
    let session = Session::start(
        IoReader::new(reader),
        IoWriter::new(writer),
        state_tx,
        TracingLogSink,
        SessionConfig::default(),
    );

    let state = tokio::time::timeout(
        Duration::from_secs(2),
        state_rx.wait_for(|state| !state.box_name.is_empty() && state.power.battery_v > 0.0),
    )
    .await??
    .clone();
    println!("{:#?}", state);

    session.shutdown();
    simulator.abort();
    Ok(())
}
