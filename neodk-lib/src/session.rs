//! One connection to a box: a reader loop and a single writer task.
//!
//! The reader loop owns the [`FrameAssembler`] and the [`Dispatcher`] and runs
//! assemble → dispatch for every chunk before awaiting the next one. All
//! outbound frames, auto-generated Acks included, go through one bounded
//! queue to the writer task, which owns the transport's sending half and the
//! outbound counters. Frames therefore never interleave on the wire.
//!
//! The reader never waits on that queue. When it is full an Ack is dropped
//! with a warning and the reader moves on; the box retransmits unacked Data.

use crate::assembler::FrameAssembler;
use crate::attribute::{PlayCommand, encode_uint1, encode_utf8};
use crate::constants::TRANSACTION_ID_SEED;
use crate::dispatcher::{Ack, Dispatcher};
use crate::error::NeoError;
use crate::frame::ServiceType;
use crate::packet::{AttributeId, OpCode};
use crate::request::RequestBuilder;
use crate::sink::{DeviceStateSink, LogSink};
use crate::transport::{TransportReader, TransportWriter};
use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Frames that may wait for the writer task before senders are held back.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Attributes read once when a session starts.
const READ_ON_CONNECT: [AttributeId; 3] = [
    AttributeId::AllPatternNames,
    AttributeId::Voltages,
    AttributeId::BoxName,
];

/// Attributes the box is asked to keep reporting.
const SUBSCRIBE_ON_CONNECT: [AttributeId; 3] = [
    AttributeId::CurrentPatternName,
    AttributeId::IntensityPercent,
    AttributeId::PlayPauseStop,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Drop received frames whose CRC16 does not match
    pub verify_crc16: bool,
    /// Send a Sync frame on the Debug service first
    pub sync_on_connect: bool,
    /// Read and subscribe to the well-known attributes on start
    pub query_on_connect: bool,
    pub transaction_id_seed: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            verify_crc16: false,
            sync_on_connect: true,
            query_on_connect: true,
            transaction_id_seed: TRANSACTION_ID_SEED,
        }
    }
}

impl SessionConfig {
    pub fn with_crc16_check(mut self, verify: bool) -> Self {
        self.verify_crc16 = verify;
        self
    }

    pub fn with_sync_on_connect(mut self, sync: bool) -> Self {
        self.sync_on_connect = sync;
        self
    }

    pub fn with_query_on_connect(mut self, query: bool) -> Self {
        self.query_on_connect = query;
        self
    }

    pub fn with_transaction_id_seed(mut self, seed: u16) -> Self {
        self.transaction_id_seed = seed;
        self
    }
}

/// How a session's reader loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The transport reported end-of-stream (disconnect or close)
    EndOfStream,
}

#[derive(Debug)]
enum Outbound {
    Ack(Ack),
    Sync(ServiceType),
    Debug {
        text: String,
        reply: oneshot::Sender<Result<(), NeoError>>,
    },
    Request {
        opcode: OpCode,
        attribute_id: AttributeId,
        data: Option<Bytes>,
        reply: Option<oneshot::Sender<Result<u16, NeoError>>>,
    },
}

/// A running connection.
pub struct Session {
    handle: SessionHandle,
    reader: JoinHandle<Result<SessionEnd, NeoError>>,
    writer: JoinHandle<()>,
}

impl Session {
    /// Spawn the reader loop and writer task. Must be called within a Tokio runtime.
    pub fn start<R, W, S, L>(reader: R, writer: W, state: S, log: L, config: SessionConfig) -> Self
    where
        R: TransportReader + 'static,
        W: TransportWriter + 'static,
        S: DeviceStateSink + Send + 'static,
        L: LogSink + Send + 'static,
    {
        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        let builder = RequestBuilder::new(config.transaction_id_seed);
        let writer = tokio::spawn(run_writer(writer, builder, queue));

        let assembler = FrameAssembler::new().with_crc16_check(config.verify_crc16);
        let dispatcher = Dispatcher::new(state, log);
        let reader = tokio::spawn(run_reader(reader, assembler, dispatcher, outbound.clone()));

        let handle = SessionHandle { outbound };
        if config.sync_on_connect {
            // The queue is empty here and the writer task holds the receiver
            let _ = handle.sync(ServiceType::Debug);
        }
        if config.query_on_connect {
            handle.query_on_connect();
        }
        info!(?config, "Session started");

        Session { handle, reader, writer }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Wait for the reader loop to finish, then stop the writer.
    pub async fn closed(self) -> Result<SessionEnd, NeoError> {
        let result = self.reader.await;
        self.writer.abort();
        result?
    }

    /// Stop both tasks without waiting for the transport.
    pub fn shutdown(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Cloneable front end for sending requests on a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    outbound: mpsc::Sender<Outbound>,
}

impl SessionHandle {
    /// Wait for room in the queue.
    async fn enqueue(&self, outbound: Outbound) -> Result<(), NeoError> {
        self.outbound.send(outbound).await.map_err(|_| NeoError::SessionClosed)
    }

    fn try_enqueue(&self, outbound: Outbound) -> Result<(), NeoError> {
        self.outbound.try_send(outbound).map_err(|e| match e {
            TrySendError::Full(_) => NeoError::QueueFull,
            TrySendError::Closed(_) => NeoError::SessionClosed,
        })
    }

    fn query_on_connect(&self) {
        let reads = READ_ON_CONNECT.iter().map(|&id| (OpCode::ReadRequest, id));
        let subscribes = SUBSCRIBE_ON_CONNECT
            .iter()
            .map(|&id| (OpCode::SubscribeRequest, id));
        for (opcode, attribute_id) in reads.chain(subscribes) {
            let request = Outbound::Request {
                opcode,
                attribute_id,
                data: None,
                reply: None,
            };
            if let Err(e) = self.try_enqueue(request) {
                warn!("{} for {} not queued: {}", opcode, attribute_id, e);
            }
        }
    }

    /// Send a request and wait until its frame has been written.
    /// Resolves to the transaction id the request carried.
    pub async fn request(
        &self,
        opcode: OpCode,
        attribute_id: AttributeId,
        data: Option<Bytes>,
    ) -> Result<u16, NeoError> {
        let (reply, done) = oneshot::channel();
        self.enqueue(Outbound::Request {
            opcode,
            attribute_id,
            data,
            reply: Some(reply),
        })
        .await?;
        done.await.map_err(|_| NeoError::SessionClosed)?
    }

    pub async fn read_attribute(&self, attribute_id: AttributeId) -> Result<u16, NeoError> {
        self.request(OpCode::ReadRequest, attribute_id, None).await
    }

    pub async fn subscribe_attribute(&self, attribute_id: AttributeId) -> Result<u16, NeoError> {
        self.request(OpCode::SubscribeRequest, attribute_id, None).await
    }

    /// `value` must be attribute-encoded (tag included).
    pub async fn write_attribute(
        &self,
        attribute_id: AttributeId,
        value: Bytes,
    ) -> Result<u16, NeoError> {
        self.request(OpCode::WriteRequest, attribute_id, Some(value)).await
    }

    pub async fn invoke(
        &self,
        attribute_id: AttributeId,
        data: Option<Bytes>,
    ) -> Result<u16, NeoError> {
        self.request(OpCode::InvokeRequest, attribute_id, data).await
    }

    /// Queue a Sync frame. Fails with [`NeoError::QueueFull`] instead of waiting.
    pub fn sync(&self, service_type: ServiceType) -> Result<(), NeoError> {
        self.try_enqueue(Outbound::Sync(service_type))
    }

    /// Send `text` as a Data frame on the Debug service.
    pub async fn send_debug_text(&self, text: &str) -> Result<(), NeoError> {
        let (reply, done) = oneshot::channel();
        self.enqueue(Outbound::Debug {
            text: text.to_string(),
            reply,
        })
        .await?;
        done.await.map_err(|_| NeoError::SessionClosed)?
    }

    pub async fn set_box_name(&self, name: &str) -> Result<u16, NeoError> {
        self.write_attribute(AttributeId::BoxName, encode_utf8(name)?).await
    }

    pub async fn select_pattern(&self, name: &str) -> Result<u16, NeoError> {
        self.write_attribute(AttributeId::CurrentPatternName, encode_utf8(name)?).await
    }

    pub async fn set_play_state(&self, command: PlayCommand) -> Result<u16, NeoError> {
        self.write_attribute(AttributeId::PlayPauseStop, encode_utf8(&command.to_string())?)
            .await
    }

    /// Intensity in percent; the box expects 0..=100.
    pub async fn set_intensity(&self, percent: u8) -> Result<u16, NeoError> {
        self.write_attribute(AttributeId::IntensityPercent, encode_uint1(percent.into()))
            .await
    }

    pub async fn refresh_voltages(&self) -> Result<u16, NeoError> {
        self.read_attribute(AttributeId::Voltages).await
    }
}

async fn run_reader<R, S, L>(
    mut reader: R,
    mut assembler: FrameAssembler,
    mut dispatcher: Dispatcher<S, L>,
    outbound: mpsc::Sender<Outbound>,
) -> Result<SessionEnd, NeoError>
where
    R: TransportReader,
    S: DeviceStateSink,
    L: LogSink,
{
    loop {
        let Some(chunk) = reader.read().await? else {
            info!(stats = ?assembler.stats(), "Transport reached end of stream");
            return Ok(SessionEnd::EndOfStream);
        };
        trace!(bytes = hex::encode(&chunk), "Serial read");
        assembler.feed(&chunk, |frame| {
            let Some(ack) = dispatcher.dispatch(&frame) else {
                return;
            };
            match outbound.try_send(Outbound::Ack(ack)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound queue full, dropping ACK {}", ack.seq);
                }
                // The writer is gone, so there is nobody to ack to
                Err(TrySendError::Closed(_)) => {}
            }
        });
    }
}

async fn run_writer<W: TransportWriter>(
    mut writer: W,
    mut builder: RequestBuilder,
    mut queue: mpsc::Receiver<Outbound>,
) {
    while let Some(outbound) = queue.recv().await {
        match outbound {
            Outbound::Ack(ack) => {
                if let Err(e) = send_frame(&mut writer, ack.to_frame()).await {
                    warn!("Failed to send ACK {}: {}", ack.seq, e);
                }
            }
            Outbound::Sync(service_type) => {
                let frame = builder.build_sync(service_type);
                if let Err(e) = send_frame(&mut writer, frame).await {
                    warn!("Failed to send SYNC: {}", e);
                }
            }
            Outbound::Debug { text, reply } => {
                let result = match builder.build_debug_frame(&text) {
                    Ok(frame) => send_frame(&mut writer, frame).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Outbound::Request {
                opcode,
                attribute_id,
                data,
                reply,
            } => {
                let result = match builder.next_request(opcode, attribute_id, data.as_deref()) {
                    Ok((transaction_id, frame)) => {
                        send_frame(&mut writer, frame).await.map(|()| transaction_id)
                    }
                    Err(e) => Err(e),
                };
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("{} for {} failed: {}", opcode, attribute_id, e);
                        }
                    }
                }
            }
        }
    }
    debug!("Writer task finished");
}

async fn send_frame<W: TransportWriter>(writer: &mut W, frame: Bytes) -> Result<(), NeoError> {
    debug!(bytes = hex::encode(&frame), "Serial write");
    writer.write(frame).await
}
