// Protocol constants for NeoDK

/// Size of the frame header (8 bytes)
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a frame may announce
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// Capacity of the receive assembly buffer
pub const MAX_FRAME_SIZE: usize = FRAME_HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Reserved prefix of a datagram packet (6 bytes)
pub const PACKET_HEADER_SIZE: usize = 6;

/// Transaction id, opcode, reserved byte and attribute id (6 bytes)
pub const ATTRIBUTE_ACTION_SIZE: usize = 6;

/// Packet header plus attribute action
pub const DATAGRAM_HEADER_SIZE: usize = PACKET_HEADER_SIZE + ATTRIBUTE_ACTION_SIZE;

/// Number of header bytes covered by CRC8 (control..reserved)
pub const CRC8_REGION: usize = 5;

/// Number of header bytes covered by CRC16 before the payload (control..crc8)
pub const CRC16_HEADER_REGION: usize = 6;

/// Initial value of the frame CRC16
pub const CRC16_SEED: u16 = 0xFFFF;

/// Frame sequence numbers count modulo this value
pub const SEQUENCE_MODULUS: u8 = 8;

/// First transaction id handed out by a fresh session
pub const TRANSACTION_ID_SEED: u16 = 1959;

/// Serial line speed of the box
pub const BAUD_RATE: u32 = 115_200;

/// Largest value a 1-byte TLV length field can carry
pub const MAX_SHORT_LENGTH: usize = u8::MAX as usize;
