use crate::constants::*;
use crate::frame::{Frame, FrameHeader, FrameType, ServiceType, has_valid_header, is_intact};
use bytes::Bytes;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Fewer than 8 bytes buffered, or the buffered window has no valid header yet
    CollectingHeader,
    /// Header accepted, waiting for the announced payload
    CollectingPayload,
}

/// Counters describing what the assembler has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames: u64,
    /// Bytes dropped one at a time while hunting for a valid header
    pub resync_drops: u64,
    /// Headers discarded because they announced more than 512 payload bytes
    pub oversize_discards: u64,
    /// Frames dropped by the optional CRC16 check
    pub crc16_failures: u64,
}

/// A complete frame sitting in the assembler's buffer.
///
/// Borrowed from the assembler, so it is only valid until the next byte is pushed.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedFrame<'a> {
    pub header: FrameHeader,
    bytes: &'a [u8],
}

impl<'a> ReceivedFrame<'a> {
    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type()
    }

    pub fn service_type(&self) -> ServiceType {
        self.header.service_type()
    }

    /// The whole frame, header included
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[FRAME_HEADER_SIZE..]
    }

    /// Copy out of the assembler buffer.
    pub fn to_frame(&self) -> Frame {
        Frame {
            header: self.header,
            payload: Bytes::copy_from_slice(self.payload()),
        }
    }
}

/// Rebuilds frames from a raw byte stream.
///
/// The header window slides one byte at a time until its CRC8 matches, which
/// resynchronises the stream after line noise. Only CRC8 gates acceptance
/// unless CRC16 verification is switched on.
pub struct FrameAssembler {
    buffer: [u8; MAX_FRAME_SIZE],
    rx_count: usize,
    pending_payload: usize,
    verify_crc16: bool,
    stats: AssemblerStats,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: [0; MAX_FRAME_SIZE],
            rx_count: 0,
            pending_payload: 0,
            verify_crc16: false,
            stats: AssemblerStats::default(),
        }
    }

    /// Also drop complete frames whose CRC16 does not match.
    pub fn with_crc16_check(mut self, verify: bool) -> Self {
        self.verify_crc16 = verify;
        self
    }

    pub fn state(&self) -> AssemblerState {
        if self.rx_count < FRAME_HEADER_SIZE {
            AssemblerState::CollectingHeader
        } else {
            AssemblerState::CollectingPayload
        }
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.rx_count
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.rx_count = 0;
        self.pending_payload = 0;
    }

    fn drop_oldest_byte(&mut self) {
        self.buffer.copy_within(1..self.rx_count, 0);
        self.rx_count -= 1;
        self.stats.resync_drops += 1;
    }

    /// Feed one byte. Returns a frame when this byte completed one.
    pub fn push(&mut self, byte: u8) -> Option<ReceivedFrame<'_>> {
        self.buffer[self.rx_count] = byte;
        self.rx_count += 1;
        if self.rx_count < FRAME_HEADER_SIZE {
            return None;
        }

        if self.rx_count == FRAME_HEADER_SIZE {
            if !has_valid_header(&self.buffer[..FRAME_HEADER_SIZE]) {
                self.drop_oldest_byte();
                return None;
            }
            let header = FrameHeader::parse(&self.buffer[..FRAME_HEADER_SIZE]).ok()?;
            self.pending_payload = header.payload_size();
            if self.pending_payload > MAX_PAYLOAD_SIZE {
                warn!("Frame payload too big: {} bytes", self.pending_payload);
                self.stats.oversize_discards += 1;
                self.reset();
                return None;
            }
        }

        if self.rx_count < FRAME_HEADER_SIZE + self.pending_payload {
            return None;
        }

        let len = self.rx_count;
        self.rx_count = 0;
        let bytes = &self.buffer[..len];
        if self.verify_crc16 && !is_intact(bytes) {
            warn!(len, "Dropping frame with bad CRC16");
            self.stats.crc16_failures += 1;
            return None;
        }
        let header = FrameHeader::parse(bytes).ok()?;
        self.stats.frames += 1;
        trace!(frame = hex::encode(bytes), "Frame assembled");
        Some(ReceivedFrame { header, bytes })
    }

    /// Feed a chunk, calling `on_frame` for every frame it completes.
    pub fn feed(&mut self, chunk: &[u8], mut on_frame: impl FnMut(ReceivedFrame<'_>)) {
        for &byte in chunk {
            if let Some(frame) = self.push(byte) {
                on_frame(frame);
            }
        }
    }
}
