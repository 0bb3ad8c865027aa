//! Frame checksum
//!
//! CRC-16 with the reflected polynomial 0xA001, seeded with 0xFFFF and no
//! final XOR (CRC-16/MODBUS). The checksum covers
//! the id byte followed by the payload.

/// Initial CRC register value
pub const CRC_INIT: u16 = 0xFFFF;

/// Reflected generator polynomial
pub const CRC_POLY: u16 = 0xA001;

/// Fold one byte into a running CRC
pub const fn update(mut crc: u16, byte: u8) -> u16 {
    crc ^= byte as u16;
    let mut i = 0;
    while i < 8 {
        crc = if crc & 1 != 0 {
            (crc >> 1) ^ CRC_POLY
        } else {
            crc >> 1
        };
        i += 1;
    }
    crc
}

/// Checksum of `id` followed by `data`
pub fn crc16(id: u8, data: &[u8]) -> u16 {
    data.iter().fold(update(CRC_INIT, id), |crc, &b| update(crc, b))
}
