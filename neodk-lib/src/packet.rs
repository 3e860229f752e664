use crate::constants::*;
use crate::error::NeoError;
use bytes::{Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Interaction opcodes (Matter subset understood by the firmware).
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum OpCode {
    None = 0,
    StatusResponse = 1,
    ReadRequest = 2,
    SubscribeRequest = 3,
    SubscribeResponse = 4,
    ReportData = 5,
    WriteRequest = 6,
    WriteResponse = 7,
    InvokeRequest = 8,
    InvokeResponse = 9,
    TimedRequest = 10,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Attribute ids exposed by the box. These are a fixed wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive, Display)]
#[repr(u16)]
pub enum AttributeId {
    Voltages = 3,
    AllPatternNames = 5,
    CurrentPatternName = 6,
    IntensityPercent = 7,
    PlayPauseStop = 8,
    BoxName = 9,

    #[num_enum(catch_all)]
    Unknown(u16),
}

/// Wire layout of the 12-byte datagram header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DatagramHeaderRaw {
    pub reserved: [u8; PACKET_HEADER_SIZE],
    pub transaction_id: U16,
    pub opcode: u8,
    pub reserved2: u8,
    pub attribute_id: U16,
}

/// A parsed Data-frame payload on the Datagram service.
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    pub transaction_id: u16,
    pub opcode: OpCode,
    pub attribute_id: AttributeId,
    /// Opcode-specific data following the header
    pub body: Bytes,
}

impl Datagram {
    pub fn new(
        transaction_id: u16,
        opcode: OpCode,
        attribute_id: AttributeId,
        body: Bytes,
    ) -> Self {
        Self {
            transaction_id,
            opcode,
            attribute_id,
            body,
        }
    }
}

impl TryFrom<Bytes> for Datagram {
    type Error = NeoError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < DATAGRAM_HEADER_SIZE {
            return Err(NeoError::InsufficientData {
                expected: DATAGRAM_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let header_bytes = bytes.split_to(DATAGRAM_HEADER_SIZE);
        let raw = DatagramHeaderRaw::read_from_bytes(header_bytes.as_ref())
            .map_err(|_| NeoError::InvalidFrame("Failed to parse datagram header".to_string()))?;

        Ok(Datagram {
            transaction_id: raw.transaction_id.get(),
            opcode: OpCode::from_primitive(raw.opcode),
            attribute_id: AttributeId::from_primitive(raw.attribute_id.get()),
            body: bytes,
        })
    }
}

impl From<Datagram> for Bytes {
    fn from(datagram: Datagram) -> Self {
        let raw = DatagramHeaderRaw {
            reserved: [0; PACKET_HEADER_SIZE],
            transaction_id: U16::new(datagram.transaction_id),
            opcode: datagram.opcode.into(),
            reserved2: 0,
            attribute_id: U16::new(datagram.attribute_id.into()),
        };
        let mut out = BytesMut::with_capacity(DATAGRAM_HEADER_SIZE + datagram.body.len());
        out.extend_from_slice(raw.as_bytes());
        out.extend_from_slice(&datagram.body);
        out.freeze()
    }
}
