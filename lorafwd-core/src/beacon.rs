//! Class B beacon PDU builder.
//!
//! Layout (all fields little-endian):
//!
//! | RFU | epoch_secs | CRC | infoDesc | lon | lat | RFU | CRC |
//! | 0-n |     4      |  2  |    1     |  3  |  3  | 0-n |  2  |
//!
//! Offsets come from a per-region `BeaconLayout`. The first CRC covers
//! `[0, infodesc_off - 2)`, the second `[infodesc_off, bcn_len - 2)`.

use serde::{Deserialize, Serialize};

use crate::crc::crc16;
use crate::types::BeaconError;

/// Field offsets of a regional beacon format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct BeaconLayout {
    pub time_off: u8,
    pub infodesc_off: u8,
    pub bcn_len: u8,
}

impl From<[u8; 3]> for BeaconLayout {
    fn from([time_off, infodesc_off, bcn_len]: [u8; 3]) -> Self {
        BeaconLayout {
            time_off,
            infodesc_off,
            bcn_len,
        }
    }
}

impl From<BeaconLayout> for [u8; 3] {
    fn from(l: BeaconLayout) -> Self {
        [l.time_off, l.infodesc_off, l.bcn_len]
    }
}

impl BeaconLayout {
    /// EU868: 17-byte beacon.
    pub const EU868: BeaconLayout = BeaconLayout {
        time_off: 2,
        infodesc_off: 8,
        bcn_len: 17,
    };

    /// US915: 23-byte beacon.
    pub const US915: BeaconLayout = BeaconLayout {
        time_off: 5,
        infodesc_off: 11,
        bcn_len: 23,
    };

    pub fn len(&self) -> usize {
        self.bcn_len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bcn_len == 0
    }

    /// Check that every field and both CRC words fit without overlapping.
    pub fn validate(&self) -> Result<(), BeaconError> {
        let time = self.time_off as usize;
        let info = self.infodesc_off as usize;
        let len = self.bcn_len as usize;
        if info < 2 {
            return Err(BeaconError::Layout(format!(
                "infodesc offset {info} leaves no room for the first CRC"
            )));
        }
        if len < 2 || info + 7 > len - 2 {
            return Err(BeaconError::Layout(format!(
                "infodesc offset {info} + 7 does not fit before the trailing CRC of a {len}-byte beacon"
            )));
        }
        if time + 4 > info - 2 {
            return Err(BeaconError::Layout(format!(
                "time field at {time} overlaps the first CRC at {}",
                info - 2
            )));
        }
        Ok(())
    }
}

/// Degrees to the 24-bit fixed-point beacon encoding: `deg / range * 2^31`,
/// truncated, low three bytes kept. Negative values wrap (two's complement).
fn fixed_point(deg: f64, range: f64) -> u32 {
    (deg / range * (1u64 << 31) as f64) as i64 as u32
}

/// Build a beacon PDU.
pub fn build_beacon(
    layout: &BeaconLayout,
    epoch_secs: i64,
    infodesc: u8,
    lat: f64,
    lon: f64,
) -> Result<Vec<u8>, BeaconError> {
    layout.validate()?;
    let time = layout.time_off as usize;
    let info = layout.infodesc_off as usize;
    let len = layout.len();

    let mut pdu = vec![0u8; len];
    pdu[time..time + 4].copy_from_slice(&(epoch_secs as u32).to_le_bytes());

    pdu[info] = infodesc;
    let ulon = fixed_point(lon, 180.0).to_le_bytes();
    let ulat = fixed_point(lat, 90.0).to_le_bytes();
    pdu[info + 1..info + 4].copy_from_slice(&ulon[..3]);
    pdu[info + 4..info + 7].copy_from_slice(&ulat[..3]);

    let crc1 = crc16(&pdu[..info - 2]);
    let crc2 = crc16(&pdu[info..len - 2]);
    pdu[info - 2..info].copy_from_slice(&crc1.to_le_bytes());
    pdu[len - 2..].copy_from_slice(&crc2.to_le_bytes());

    Ok(pdu)
}

/// Which CRC-protected regions of a beacon check out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconCheck {
    pub time_ok: bool,
    pub info_ok: bool,
}

impl BeaconCheck {
    pub fn is_valid(&self) -> bool {
        self.time_ok && self.info_ok
    }
}

/// Recompute both CRCs of `pdu` and compare with the stored words.
pub fn verify_beacon(layout: &BeaconLayout, pdu: &[u8]) -> Result<BeaconCheck, BeaconError> {
    layout.validate()?;
    let info = layout.infodesc_off as usize;
    let len = layout.len();
    if pdu.len() != len {
        return Err(BeaconError::Length {
            expected: len,
            actual: pdu.len(),
        });
    }
    let stored1 = u16::from_le_bytes([pdu[info - 2], pdu[info - 1]]);
    let stored2 = u16::from_le_bytes([pdu[len - 2], pdu[len - 1]]);
    Ok(BeaconCheck {
        time_ok: crc16(&pdu[..info - 2]) == stored1,
        info_ok: crc16(&pdu[info..len - 2]) == stored2,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: BeaconLayout = BeaconLayout {
        time_off: 4,
        infodesc_off: 10,
        bcn_len: 19,
    };

    #[test]
    fn test_presets_valid() {
        assert!(BeaconLayout::EU868.validate().is_ok());
        assert!(BeaconLayout::US915.validate().is_ok());
        assert!(LAYOUT.validate().is_ok());
    }

    #[test]
    fn test_overlapping_trailing_crc_rejected() {
        // lat would end at byte 16, the trailing CRC starts at 16
        let layout = BeaconLayout::from([4, 10, 18]);
        assert!(matches!(
            build_beacon(&layout, 0, 0, 0.0, 0.0),
            Err(BeaconError::Layout(_))
        ));
    }

    #[test]
    fn test_invalid_layouts() {
        for raw in [[0, 1, 17], [0, 0, 0], [0, 8, 1], [5, 8, 17], [255, 8, 17]] {
            assert!(
                BeaconLayout::from(raw).validate().is_err(),
                "layout {raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let a = build_beacon(&LAYOUT, 1_234_567_890, 0, 45.5, -73.6).unwrap();
        let b = build_beacon(&LAYOUT, 1_234_567_890, 0, 45.5, -73.6).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 19);
    }

    #[test]
    fn test_field_placement() {
        let pdu = build_beacon(&BeaconLayout::EU868, 0x0102_0304, 0x7F, 0.0, 0.0).unwrap();
        assert_eq!(&pdu[0..2], &[0, 0]);
        assert_eq!(&pdu[2..6], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(pdu[8], 0x7F);
        assert_eq!(&pdu[9..15], &[0; 6]);
        assert_eq!(u16::from_le_bytes([pdu[6], pdu[7]]), crc16(&pdu[..6]));
        assert_eq!(u16::from_le_bytes([pdu[15], pdu[16]]), crc16(&pdu[8..15]));
    }

    #[test]
    fn test_coordinates() {
        // 90 degrees latitude = 2^31 -> low 3 bytes are zero; 45 degrees = 2^30
        assert_eq!(fixed_point(90.0, 90.0), 0x8000_0000);
        assert_eq!(fixed_point(45.0, 90.0), 0x4000_0000);
        assert_eq!(fixed_point(-90.0, 90.0), 0x8000_0000);
        assert_eq!(fixed_point(-1.0, 180.0), (-11_930_464i64) as u32);

        let pdu = build_beacon(&BeaconLayout::EU868, 0, 0, 1.0, 1.0).unwrap();
        let lon = (1.0f64 / 180.0 * 2147483648.0) as u32;
        let lat = (1.0f64 / 90.0 * 2147483648.0) as u32;
        assert_eq!(&pdu[9..12], &lon.to_le_bytes()[..3]);
        assert_eq!(&pdu[12..15], &lat.to_le_bytes()[..3]);
    }

    #[test]
    fn test_epoch_truncated_to_32_bits() {
        let pdu = build_beacon(&BeaconLayout::EU868, 0x1_0000_0005, 0, 0.0, 0.0).unwrap();
        assert_eq!(&pdu[2..6], &[0x05, 0, 0, 0]);
    }

    #[test]
    fn test_verify_roundtrip() {
        let pdu = build_beacon(&BeaconLayout::US915, 1_000_000, 1, -33.9, 151.2).unwrap();
        assert!(verify_beacon(&BeaconLayout::US915, &pdu).unwrap().is_valid());
    }

    #[test]
    fn test_region_crcs_independent() {
        let base = build_beacon(&LAYOUT, 1000, 0, 10.0, 20.0).unwrap();

        // Changing the time only touches the first CRC word
        let other_time = build_beacon(&LAYOUT, 1001, 0, 10.0, 20.0).unwrap();
        assert_ne!(&base[8..10], &other_time[8..10]);
        assert_eq!(&base[17..19], &other_time[17..19]);

        // Changing the info fields only touches the trailing CRC word
        let other_info = build_beacon(&LAYOUT, 1000, 1, 10.0, 20.0).unwrap();
        assert_eq!(&base[8..10], &other_info[8..10]);
        assert_ne!(&base[17..19], &other_info[17..19]);
    }

    #[test]
    fn test_verify_detects_corruption() {
        let mut pdu = build_beacon(&LAYOUT, 1000, 0, 10.0, 20.0).unwrap();
        pdu[5] ^= 0x01;
        let check = verify_beacon(&LAYOUT, &pdu).unwrap();
        assert!(!check.time_ok);
        assert!(check.info_ok);

        let mut pdu = build_beacon(&LAYOUT, 1000, 0, 10.0, 20.0).unwrap();
        pdu[12] ^= 0x80;
        let check = verify_beacon(&LAYOUT, &pdu).unwrap();
        assert!(check.time_ok);
        assert!(!check.info_ok);
    }

    #[test]
    fn test_verify_length_mismatch() {
        assert_eq!(
            verify_beacon(&LAYOUT, &[0; 5]),
            Err(BeaconError::Length {
                expected: 19,
                actual: 5
            })
        );
    }

    #[test]
    fn test_layout_serde() {
        let layout: BeaconLayout = serde_json::from_str("[2, 8, 17]").unwrap();
        assert_eq!(layout, BeaconLayout::EU868);
        assert_eq!(serde_json::to_string(&BeaconLayout::US915).unwrap(), "[5,11,23]");
    }
}
