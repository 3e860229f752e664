//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use neodk_lib::assembler::{AssemblerState, FrameAssembler};
#[allow(unused_imports)]
pub use neodk_lib::attribute::{Encoding, PlayCommand, PlayState};
#[allow(unused_imports)]
pub use neodk_lib::dispatcher::{Ack, Dispatcher};
#[allow(unused_imports)]
pub use neodk_lib::error::NeoError;
#[allow(unused_imports)]
pub use neodk_lib::frame::{Frame, FrameHeader, FrameType, ServiceType, build_ack, build_frame};
#[allow(unused_imports)]
pub use neodk_lib::packet::{AttributeId, Datagram, OpCode};
#[allow(unused_imports)]
pub use neodk_lib::request::RequestBuilder;
#[allow(unused_imports)]
pub use neodk_lib::sink::{DeviceState, MemoryLogSink};

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Ack for Datagram sequence 3
#[allow(dead_code)]
pub const ACK_DATAGRAM_3: &str = "1303000000ae6082";

/// Sync on the Debug service, sequence 0
#[allow(dead_code)]
pub const SYNC_DEBUG_0: &str = "06000000004b7a5e";

/// ReadRequest for AllPatternNames, transaction 1959, sequence 1
#[allow(dead_code)]
pub const READ_ALL_PATTERNS: &str = "1808000c00679c4c000000000000a70702000500";

/// ReportData for Voltages (12000 mV, 5000 mV, 250 mA), transaction 7, sequence 3
#[allow(dead_code)]
pub const REPORT_VOLTAGES: &str = "1818001400ff0fe10000000000000700050003001006e02e8813fa00";

/// ReportData for IntensityPercent = 55, transaction 8, sequence 2
#[allow(dead_code)]
pub const REPORT_INTENSITY_55: &str = "1810000e009a03d10000000000000800050007000437";

/// Debug-service Data frame carrying "hello", sequence 5
#[allow(dead_code)]
pub const DEBUG_HELLO: &str = "08280005002636f268656c6c6f";

/// Build a ReportData frame on the Datagram service.
#[allow(dead_code)]
pub fn report_frame(seq: u8, transaction_id: u16, attribute_id: AttributeId, body: &[u8]) -> Bytes {
    let packet: Bytes = Datagram::new(
        transaction_id,
        OpCode::ReportData,
        attribute_id,
        Bytes::copy_from_slice(body),
    )
    .into();
    build_frame(&packet, FrameType::Data, ServiceType::Datagram, seq)
        .expect("Failed to build report frame")
}

/// Run every byte of `stream` through a fresh assembler and collect complete frames.
#[allow(dead_code)]
pub fn assemble_all(stream: &[u8]) -> Vec<Vec<u8>> {
    let mut assembler = FrameAssembler::new();
    let mut frames = Vec::new();
    assembler.feed(stream, |frame| frames.push(frame.as_bytes().to_vec()));
    frames
}

/// Route library logs to the test harness output. Filtered by `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_test_writer())
        .try_init();
}
