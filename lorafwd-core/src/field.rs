//! Fixed-width integer readers over a frame.
//!
//! Every reader checks `offset + width <= buf.len()` before touching the
//! buffer and returns `Malformed::OutOfBounds` otherwise.

use crate::types::Malformed;

/// Borrow `width` bytes at `offset`.
pub fn bytes_at(buf: &[u8], offset: usize, width: usize) -> Result<&[u8], Malformed> {
    offset
        .checked_add(width)
        .and_then(|end| buf.get(offset..end))
        .ok_or(Malformed::OutOfBounds {
            offset,
            width,
            len: buf.len(),
        })
}

fn array_at<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], Malformed> {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes_at(buf, offset, N)?);
    Ok(out)
}

pub fn u8_at(buf: &[u8], offset: usize) -> Result<u8, Malformed> {
    Ok(array_at::<1>(buf, offset)?[0])
}

pub fn i8_at(buf: &[u8], offset: usize) -> Result<i8, Malformed> {
    Ok(i8::from_be_bytes(array_at(buf, offset)?))
}

// Little-endian (LoRaWAN MAC fields, telemetry timestamps)

pub fn le_u16(buf: &[u8], offset: usize) -> Result<u16, Malformed> {
    Ok(u16::from_le_bytes(array_at(buf, offset)?))
}

pub fn le_u32(buf: &[u8], offset: usize) -> Result<u32, Malformed> {
    Ok(u32::from_le_bytes(array_at(buf, offset)?))
}

pub fn le_i32(buf: &[u8], offset: usize) -> Result<i32, Malformed> {
    Ok(i32::from_le_bytes(array_at(buf, offset)?))
}

pub fn le_u64(buf: &[u8], offset: usize) -> Result<u64, Malformed> {
    Ok(u64::from_le_bytes(array_at(buf, offset)?))
}

// Big-endian (proprietary telemetry)

pub fn be_u16(buf: &[u8], offset: usize) -> Result<u16, Malformed> {
    Ok(u16::from_be_bytes(array_at(buf, offset)?))
}

/// 3-byte big-endian value in the low 24 bits.
pub fn be_u24(buf: &[u8], offset: usize) -> Result<u32, Malformed> {
    let [a, b, c] = array_at::<3>(buf, offset)?;
    Ok(u32::from_be_bytes([0, a, b, c]))
}

pub fn be_u32(buf: &[u8], offset: usize) -> Result<u32, Malformed> {
    Ok(u32::from_be_bytes(array_at(buf, offset)?))
}

pub fn be_u64(buf: &[u8], offset: usize) -> Result<u64, Malformed> {
    Ok(u64::from_be_bytes(array_at(buf, offset)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BUF: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x88];

    #[test]
    fn test_little_endian() {
        assert_eq!(le_u16(&BUF, 0).unwrap(), 0x0201);
        assert_eq!(le_u32(&BUF, 1).unwrap(), 0x0504_0302);
        assert_eq!(le_u64(&BUF, 0).unwrap(), 0x8807_0605_0403_0201);
        assert_eq!(le_i32(&BUF, 4).unwrap(), 0x8807_0605u32 as i32);
    }

    #[test]
    fn test_big_endian() {
        assert_eq!(be_u16(&BUF, 0).unwrap(), 0x0102);
        assert_eq!(be_u24(&BUF, 1).unwrap(), 0x02_0304);
        assert_eq!(be_u32(&BUF, 4).unwrap(), 0x0506_0788);
        assert_eq!(be_u64(&BUF, 0).unwrap(), 0x0102_0304_0506_0788);
    }

    #[test]
    fn test_signed_byte() {
        assert_eq!(i8_at(&BUF, 7).unwrap(), -120);
        assert_eq!(u8_at(&BUF, 7).unwrap(), 0x88);
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(
            le_u32(&BUF, 5),
            Err(Malformed::OutOfBounds {
                offset: 5,
                width: 4,
                len: 8
            })
        );
        assert!(u8_at(&BUF, 8).is_err());
        assert!(u8_at(&[], 0).is_err());
        assert!(bytes_at(&BUF, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_exact_end() {
        assert_eq!(bytes_at(&BUF, 8, 0).unwrap(), &[] as &[u8]);
        assert_eq!(be_u16(&BUF, 6).unwrap(), 0x0788);
    }
}
