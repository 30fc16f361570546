//! # CRC-8 / CRC-16 Implementation
//!
//! Checksums protecting host link frames.
//!
//! **CRC-8**: polynomial 0x31 (x^8 + x^5 + x^4 + 1), MSB first, initial value 0x00.
//! Guards the 3-byte frame header.
//!
//! **CRC-16/MODBUS**: reflected polynomial 0xA001, initial value 0xFFFF.
//! Guards the whole frame.
//!
//! Both lookup tables are generated at compile time, so there is no
//! initialization step and no shared mutable state.

/// CRC-8 polynomial
const CRC8_POLY: u8 = 0x31;

/// CRC-8 initial value
const CRC8_INIT: u8 = 0x00;

/// CRC-16 reflected polynomial
const CRC16_POLY: u16 = 0xA001;

/// CRC-16 initial value
const CRC16_INIT: u16 = 0xFFFF;

/// Precomputed CRC-8 lookup table
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Precomputed CRC-16 lookup table
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC-8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Generate CRC-16 lookup table at compile time
///
/// Each entry is built by feeding the index LSB-first through the
/// reflected polynomial.
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc: u16 = 0;
        let mut c = i as u16;
        let mut j = 0;

        while j < 8 {
            if ((crc ^ c) & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
            c >>= 1;
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate CRC-8 checksum using lookup table
///
/// # Examples
///
/// ```
/// use rover_link::protocol::crc::crc8;
///
/// // Header of a frame announcing 18 data bytes
/// assert_eq!(crc8(&[0xA5, 0x12, 0x00]), 0x74);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;

    for &byte in data {
        crc = CRC8_TABLE[(crc ^ byte) as usize];
    }

    crc
}

/// Calculate CRC-16/MODBUS checksum using lookup table
///
/// # Examples
///
/// ```
/// use rover_link::protocol::crc::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x4B37);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0x00FF) as usize];
    }

    crc
}

/// Verify a message whose last byte is its CRC-8
///
/// Checks `message[..size - 1]` against `message[size - 1]`. Fails closed
/// when `size` leaves no data byte or runs past the end of `message`.
pub fn crc8_check(message: &[u8], size: usize) -> bool {
    if size < 2 || size > message.len() {
        return false;
    }

    crc8(&message[..size - 1]) == message[size - 1]
}

/// Verify a message whose last two bytes are its CRC-16, little-endian
///
/// Checks `message[..size - 2]` against `message[size - 2..size]`. Fails
/// closed when `size` leaves no data byte or runs past the end of `message`.
pub fn crc16_check(message: &[u8], size: usize) -> bool {
    if size < 3 || size > message.len() {
        return false;
    }

    let expected = u16::from_le_bytes([message[size - 2], message[size - 1]]);
    crc16(&message[..size - 2]) == expected
}

/// Bitwise CRC-8, slow but easy to verify by eye
#[allow(dead_code)]
fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

/// Bitwise CRC-16/MODBUS, slow but easy to verify by eye
#[allow(dead_code)]
fn crc16_slow(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc ^= byte as u16;

        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
