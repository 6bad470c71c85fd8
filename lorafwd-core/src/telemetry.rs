//! Proprietary telemetry frames (non-LoRaWAN).
//!
//! Frame layout:
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0      | 1    | `0x01` DevEUI marker           |
//! | 1      | 8    | DevEUI, big-endian             |
//! | 9      | 1    | `0x41` FCnt marker             |
//! | 10     | 4    | FCnt, big-endian               |
//! | 14     | ...  | tag/length/value records       |
//!
//! Records:
//! - `0x61` GNSS:  size(1) ts(4, LE) status(4, BE) fix(size-8)
//! - `0x62` Wi-Fi: size(1) ts(4, LE) beacons((size-4)/8 × 8)
//! - `0x10` battery(2) `0x11` energy(4) `0x12` charge time(4)
//!   `0x30` flags(1) `0x40` resets(3) `0x50` temperature(1, signed),
//!   all big-endian
//!
//! An unknown tag ends the scan; everything decoded before it is kept.

use tracing::trace;

use crate::field;
use crate::types::*;

pub const MARKER_DEVEUI: u8 = 0x01;
pub const MARKER_FCNT: u8 = 0x41;
pub const OFF_DEVEUI: usize = 1;
pub const OFF_FCNT_MARKER: usize = 9;
pub const OFF_FCNT: usize = 10;
pub const OFF_RECORDS: usize = 14;

pub const TAG_GNSS: u8 = 0x61;
pub const TAG_WIFI: u8 = 0x62;
pub const TAG_BATTERY: u8 = 0x10;
pub const TAG_ENERGY: u8 = 0x11;
pub const TAG_CHARGE: u8 = 0x12;
pub const TAG_FLAGS: u8 = 0x30;
pub const TAG_RESETS: u8 = 0x40;
pub const TAG_TEMPERATURE: u8 = 0x50;

/// GNSS record header inside `size`: timestamp + status.
const GNSS_HEADER: usize = 8;
/// Wi-Fi record header inside `size`: timestamp.
const WIFI_HEADER: usize = 4;
const WIFI_BEACON_LEN: usize = 8;

/// True if `frame` carries the telemetry device header.
pub fn is_telemetry(frame: &[u8]) -> bool {
    frame.len() >= OFF_RECORDS
        && frame[0] == MARKER_DEVEUI
        && frame[OFF_FCNT_MARKER] == MARKER_FCNT
}

/// Decode a telemetry frame. The caller has already checked `is_telemetry`.
pub fn decode_telemetry(frame: &[u8]) -> Result<Telemetry<'_>, Malformed> {
    let dev_eui = field::be_u64(frame, OFF_DEVEUI)?;
    let fcnt = field::be_u32(frame, OFF_FCNT)?;

    let mut records = Vec::new();
    let mut status = DeviceStatus::default();
    let mut off = OFF_RECORDS;

    while off < frame.len() {
        let tag = frame[off];
        match tag {
            TAG_GNSS | TAG_WIFI => {
                let body = record_body(frame, off, tag)?;
                records.push(parse_record(tag, body)?);
                off += 2 + body.len();
            }
            TAG_BATTERY => {
                status.battery = Some(field::be_u16(frame, off + 1)?);
                off += 3;
            }
            TAG_ENERGY => {
                status.energy = Some(field::be_u32(frame, off + 1)?);
                off += 5;
            }
            TAG_CHARGE => {
                status.charge_time = Some(field::be_u32(frame, off + 1)?);
                off += 5;
            }
            TAG_FLAGS => {
                status.flags = Some(field::u8_at(frame, off + 1)?);
                off += 2;
            }
            TAG_RESETS => {
                status.resets = Some(field::be_u24(frame, off + 1)?);
                off += 4;
            }
            TAG_TEMPERATURE => {
                status.temperature = Some(field::i8_at(frame, off + 1)?);
                off += 2;
            }
            _ => {
                trace!(offset = off, tag, "unknown telemetry tag, stopping scan");
                break;
            }
        }
    }

    Ok(Telemetry {
        dev_eui,
        fcnt,
        records,
        status,
        raw: frame,
    })
}

/// The `size` bytes following a record's tag and size byte.
fn record_body(frame: &[u8], off: usize, tag: u8) -> Result<&[u8], Malformed> {
    let size = field::u8_at(frame, off + 1)? as usize;
    field::bytes_at(frame, off + 2, size).map_err(|_| Malformed::Truncated {
        tag,
        offset: off,
        size,
        len: frame.len(),
    })
}

fn parse_record(tag: u8, body: &[u8]) -> Result<TelemetryRecord<'_>, Malformed> {
    let too_small = Malformed::RecordSize {
        tag,
        size: body.len(),
    };
    if tag == TAG_GNSS {
        if body.len() < GNSS_HEADER {
            return Err(too_small);
        }
        Ok(TelemetryRecord::Gnss {
            timestamp: field::le_u32(body, 0)?,
            status: field::be_u32(body, 4)?,
            fix: &body[GNSS_HEADER..],
        })
    } else {
        if body.len() < WIFI_HEADER {
            return Err(too_small);
        }
        let beacons = &body[WIFI_HEADER..];
        let whole = beacons.len() / WIFI_BEACON_LEN * WIFI_BEACON_LEN;
        Ok(TelemetryRecord::Wifi {
            timestamp: field::le_u32(body, 0)?,
            beacons: &beacons[..whole],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
