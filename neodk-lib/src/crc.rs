//! Bit-serial CCITT checksums used by the frame layer.

const CRC8_POLY: u8 = 0x07;
const CRC16_POLY: u16 = 0x1021;

/// CRC-8/CCITT (poly 0x07, init 0, MSB first) over `data`.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ CRC8_POLY } else { crc << 1 };
        }
    }
    crc
}

/// CRC-16/CCITT (poly 0x1021, MSB first) over `data`, starting from `seed`.
///
/// Passing the result of a previous call as `seed` continues the checksum,
/// which is how the frame CRC is accumulated over header and payload.
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    let mut crc = seed;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ CRC16_POLY } else { crc << 1 };
        }
    }
    crc
}
