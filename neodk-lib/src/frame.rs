use crate::constants::*;
use crate::crc::{crc8, crc16};
use crate::error::NeoError;
use bytes::{Bytes, BytesMut};
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;
use zerocopy::byteorder::big_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Byte 0 of every frame.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Control {
    pub ack: bool,
    pub frame_type: B3,
    pub service_type: B3,
    #[skip]
    unused: bool,
}

/// Byte 1 of every frame. Data and Sync frames carry `seq_nr`, Ack frames `ack_nr`.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sequence {
    pub ack_nr: B3,
    pub seq_nr: B5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum FrameType {
    None = 0,
    Ack = 1,
    // never sent by the host, only logged when seen
    Nak = 2,
    Sync = 3,
    Data = 4,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Network service carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum ServiceType {
    Debug = 0,
    Datagram = 1,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Wire layout of the 8-byte frame header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeaderRaw {
    pub control: u8,
    pub sequence: u8,
    pub payload_size: U16,
    pub reserved: u8,
    pub crc8: u8,
    pub crc16: U16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    pub control: Control,
    pub sequence: Sequence,
    pub payload_size: u16,
    pub crc8: u8,
    pub crc16: u16,
}

impl From<FrameHeaderRaw> for FrameHeader {
    fn from(raw: FrameHeaderRaw) -> Self {
        Self {
            control: Control::from_bytes([raw.control]),
            sequence: Sequence::from_bytes([raw.sequence]),
            payload_size: raw.payload_size.get(),
            crc8: raw.crc8,
            crc16: raw.crc16.get(),
        }
    }
}

impl FrameHeader {
    /// Parse the first eight bytes of `bytes`. No checksum is verified here.
    pub fn parse(bytes: &[u8]) -> Result<Self, NeoError> {
        let (raw, _) =
            FrameHeaderRaw::read_from_prefix(bytes).map_err(|_| NeoError::InsufficientData {
                expected: FRAME_HEADER_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self::from(raw))
    }

    pub fn frame_type(&self) -> FrameType {
        FrameType::from_primitive(self.control.frame_type())
    }

    pub fn service_type(&self) -> ServiceType {
        ServiceType::from_primitive(self.control.service_type())
    }

    pub fn is_ack(&self) -> bool {
        self.control.ack()
    }

    /// Sequence number of a Data or Sync frame.
    pub fn seq_nr(&self) -> u8 {
        self.sequence.seq_nr() % SEQUENCE_MODULUS
    }

    /// Sequence number acknowledged by an Ack frame.
    pub fn ack_nr(&self) -> u8 {
        self.sequence.ack_nr()
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size as usize
    }
}

/// True when byte 5 of `header` matches the CRC8 of bytes 0..5.
pub fn has_valid_header(header: &[u8]) -> bool {
    header.len() >= FRAME_HEADER_SIZE && header[CRC8_REGION] == crc8(&header[..CRC8_REGION])
}

/// CRC16 of a complete frame as the sender computes it: header bytes 0..6, then the payload.
pub fn frame_crc16(frame: &[u8]) -> u16 {
    let header = &frame[..CRC16_HEADER_REGION.min(frame.len())];
    let payload = frame.get(FRAME_HEADER_SIZE..).unwrap_or_default();
    crc16(crc16(CRC16_SEED, header), payload)
}

/// True when the CRC16 stored in bytes 6..8 matches the frame contents.
pub fn is_intact(frame: &[u8]) -> bool {
    match FrameHeader::parse(frame) {
        Ok(header) => header.crc16 == frame_crc16(frame),
        Err(_) => false,
    }
}

fn init_frame(
    frame_type: FrameType,
    service_type: ServiceType,
    sequence: Sequence,
    ack: bool,
    payload: &[u8],
) -> BytesMut {
    let control = Control::new()
        .with_ack(ack)
        .with_frame_type(u8::from(frame_type) & 0x7)
        .with_service_type(u8::from(service_type) & 0x7);
    let raw = FrameHeaderRaw {
        control: control.into_bytes()[0],
        sequence: sequence.into_bytes()[0],
        payload_size: U16::new(payload.len() as u16),
        reserved: 0,
        crc8: 0,
        crc16: U16::new(0),
    };

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(raw.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Fill in CRC8 (byte 5) and CRC16 (bytes 6..8, big-endian) of an assembled frame.
pub fn seal(frame: &mut [u8]) {
    frame[CRC8_REGION] = crc8(&frame[..CRC8_REGION]);
    let crc = frame_crc16(frame);
    frame[CRC16_HEADER_REGION..FRAME_HEADER_SIZE].copy_from_slice(&crc.to_be_bytes());
}

/// Build a complete, checksummed frame around `payload`.
pub fn build_frame(
    payload: &[u8],
    frame_type: FrameType,
    service_type: ServiceType,
    seq: u8,
) -> Result<Bytes, NeoError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(NeoError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let sequence = Sequence::new().with_seq_nr(seq % SEQUENCE_MODULUS);
    let mut frame = init_frame(frame_type, service_type, sequence, false, payload);
    seal(&mut frame);
    Ok(frame.freeze())
}

/// Build the zero-payload Ack frame for sequence `ack_nr` on `service_type`.
pub fn build_ack(service_type: ServiceType, ack_nr: u8) -> Bytes {
    let sequence = Sequence::new().with_ack_nr(ack_nr & 0x7);
    let mut frame = init_frame(FrameType::Ack, service_type, sequence, true, &[]);
    seal(&mut frame);
    frame.freeze()
}

/// An owned, complete frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type()
    }

    pub fn service_type(&self) -> ServiceType {
        self.header.service_type()
    }
}

impl TryFrom<Bytes> for Frame {
    type Error = NeoError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        let header = FrameHeader::parse(&bytes)?;
        let expected = FRAME_HEADER_SIZE + header.payload_size();
        if bytes.len() != expected {
            return Err(NeoError::InvalidFrame(format!(
                "frame is {} bytes, header announces {}",
                bytes.len(),
                expected
            )));
        }
        let payload = bytes.split_off(FRAME_HEADER_SIZE);
        Ok(Frame { header, payload })
    }
}
