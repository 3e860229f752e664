use crate::assembler::ReceivedFrame;
use crate::attribute::{ReportSkip, decode_report};
use crate::frame::{FrameType, ServiceType, build_ack};
use crate::packet::{AttributeId, Datagram, OpCode};
use crate::sink::{DeviceStateSink, LogSink};
use bytes::Bytes;
use tracing::{debug, trace, warn};

/// Acknowledgement owed to the box for a received Data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub service_type: ServiceType,
    pub seq: u8,
}

impl Ack {
    pub fn to_frame(self) -> Bytes {
        build_ack(self.service_type, self.seq)
    }
}

/// Interprets complete incoming frames and feeds the sinks.
///
/// Nothing here fails: malformed or unexpected input is logged and dropped.
pub struct Dispatcher<S, L> {
    state: S,
    log: L,
    last_ack: Option<u8>,
}

impl<S: DeviceStateSink, L: LogSink> Dispatcher<S, L> {
    pub fn new(state: S, log: L) -> Self {
        Self {
            state,
            log,
            last_ack: None,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn into_parts(self) -> (S, L) {
        (self.state, self.log)
    }

    /// Sequence number carried by the most recent Ack from the box
    pub fn last_ack(&self) -> Option<u8> {
        self.last_ack
    }

    /// Handle one frame. Returns the Ack to send back when the frame was a Data frame.
    pub fn dispatch(&mut self, frame: &ReceivedFrame<'_>) -> Option<Ack> {
        let header = frame.header;
        match frame.frame_type() {
            FrameType::Ack => {
                trace!("Got ACK {}", header.ack_nr());
                self.last_ack = Some(header.ack_nr());
                None
            }
            FrameType::Data => {
                let ack = Ack {
                    service_type: frame.service_type(),
                    seq: header.seq_nr(),
                };
                debug!(
                    seq = ack.seq,
                    service = %ack.service_type,
                    payload_size = header.payload_size(),
                    "Got Data frame"
                );
                self.route(frame.service_type(), frame.payload());
                Some(ack)
            }
            other => {
                debug!(seq = header.seq_nr(), "Got {} frame", other);
                None
            }
        }
    }

    fn route(&mut self, service_type: ServiceType, payload: &[u8]) {
        if payload.is_empty() {
            return;
        }
        match service_type {
            ServiceType::Debug => self.log.debug(&String::from_utf8_lossy(payload)),
            ServiceType::Datagram => self.handle_datagram(payload),
            ServiceType::Unknown(value) => {
                debug!(service = value, "Ignoring payload for unknown service type")
            }
        }
    }

    fn handle_datagram(&mut self, payload: &[u8]) {
        let datagram = match Datagram::try_from(Bytes::copy_from_slice(payload)) {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!("Dropping malformed datagram: {}", e);
                return;
            }
        };

        if datagram.opcode == OpCode::ReportData {
            self.handle_report(datagram.attribute_id, &datagram.body);
        } else {
            self.log.log(&format!(
                "Transaction ID={}, opcode={}",
                datagram.transaction_id,
                u8::from(datagram.opcode)
            ));
        }
    }

    fn handle_report(&mut self, attribute_id: AttributeId, body: &[u8]) {
        match decode_report(attribute_id, body) {
            Ok(report) => {
                self.log.log(&report.to_string());
                report.apply(&mut self.state);
            }
            Err(skip @ ReportSkip::UnknownAttribute(_)) => self.log.log(&skip.to_string()),
            Err(skip) => warn!("Ignoring report: {}", skip),
        }
    }
}
