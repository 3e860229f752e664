use crate::constants::*;
use crate::error::NeoError;
use crate::frame::{FrameType, ServiceType, build_frame};
use crate::packet::{AttributeId, Datagram, OpCode};
use bytes::Bytes;
use tracing::trace;

/// Outbound counters of one connection.
///
/// Every Sync and Data frame consumes the next sequence number (mod 8); every
/// request consumes the next transaction id (mod 65536).
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    tx_seq: u8,
    transaction_id: u16,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(TRANSACTION_ID_SEED)
    }
}

impl RequestBuilder {
    pub fn new(transaction_id_seed: u16) -> Self {
        Self {
            tx_seq: 0,
            transaction_id: transaction_id_seed,
        }
    }

    /// Sequence number the next Sync or Data frame will carry
    pub fn tx_seq(&self) -> u8 {
        self.tx_seq
    }

    /// Transaction id the next request will carry
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.tx_seq;
        self.tx_seq = (self.tx_seq + 1) % SEQUENCE_MODULUS;
        seq
    }

    fn next_transaction_id(&mut self) -> u16 {
        let id = self.transaction_id;
        self.transaction_id = self.transaction_id.wrapping_add(1);
        id
    }

    /// Zero-payload Sync frame.
    pub fn build_sync(&mut self, service_type: ServiceType) -> Bytes {
        let seq = self.next_seq();
        trace!(seq, %service_type, "Building Sync frame");
        // an empty payload is always within bounds
        build_frame(&[], FrameType::Sync, service_type, seq).unwrap_or_default()
    }

    /// Data frame on the Debug service carrying `text`.
    pub fn build_debug_frame(&mut self, text: &str) -> Result<Bytes, NeoError> {
        if text.len() > MAX_PAYLOAD_SIZE {
            return Err(NeoError::PayloadTooLarge {
                size: text.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let seq = self.next_seq();
        build_frame(text.as_bytes(), FrameType::Data, ServiceType::Debug, seq)
    }

    /// Datagram request frame using an explicit `transaction_id`.
    ///
    /// Counters are only consumed when the frame could be built.
    pub fn build_request(
        &mut self,
        transaction_id: u16,
        opcode: OpCode,
        attribute_id: AttributeId,
        data: Option<&[u8]>,
    ) -> Result<Bytes, NeoError> {
        let body = data.map(Bytes::copy_from_slice).unwrap_or_default();
        let size = DATAGRAM_HEADER_SIZE + body.len();
        if size > MAX_PAYLOAD_SIZE {
            return Err(NeoError::PayloadTooLarge {
                size,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let packet: Bytes = Datagram::new(transaction_id, opcode, attribute_id, body).into();
        let seq = self.next_seq();
        trace!(seq, transaction_id, %opcode, %attribute_id, "Building request frame");
        build_frame(&packet, FrameType::Data, ServiceType::Datagram, seq)
    }

    /// Like [`build_request`](Self::build_request), taking the next transaction id.
    /// Returns the id used together with the frame.
    pub fn next_request(
        &mut self,
        opcode: OpCode,
        attribute_id: AttributeId,
        data: Option<&[u8]>,
    ) -> Result<(u16, Bytes), NeoError> {
        let transaction_id = self.transaction_id;
        let frame = self.build_request(transaction_id, opcode, attribute_id, data)?;
        self.next_transaction_id();
        Ok((transaction_id, frame))
    }

    pub fn read_request(&mut self, attribute_id: AttributeId) -> Result<(u16, Bytes), NeoError> {
        self.next_request(OpCode::ReadRequest, attribute_id, None)
    }

    pub fn subscribe_request(
        &mut self,
        attribute_id: AttributeId,
    ) -> Result<(u16, Bytes), NeoError> {
        self.next_request(OpCode::SubscribeRequest, attribute_id, None)
    }

    /// `value` must already be attribute-encoded (tag included).
    pub fn write_request(
        &mut self,
        attribute_id: AttributeId,
        value: &[u8],
    ) -> Result<(u16, Bytes), NeoError> {
        self.next_request(OpCode::WriteRequest, attribute_id, Some(value))
    }

    pub fn invoke_request(
        &mut self,
        attribute_id: AttributeId,
        data: Option<&[u8]>,
    ) -> Result<(u16, Bytes), NeoError> {
        self.next_request(OpCode::InvokeRequest, attribute_id, data)
    }
}
