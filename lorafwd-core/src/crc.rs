//! CRC-16 for beacon PDUs.
//!
//! Polynomial: x^16 + x^12 + x^5 + 1
//! Generator: 0x1021, initial remainder 0, no reflection, no final XOR.
//!
//! Computed bit-serially: beacons are a couple of dozen bytes, built once
//! per beacon period.

const POLYNOMIAL: u32 = 0x1021;

/// CRC-16 over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut remainder = 0u32;
    for &byte in data {
        remainder ^= (byte as u32) << 8;
        for _ in 0..8 {
            if remainder & 0x8000 != 0 {
                remainder = (remainder << 1) ^ POLYNOMIAL;
            } else {
                remainder <<= 1;
            }
        }
    }
    (remainder & 0xFFFF) as u16
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
