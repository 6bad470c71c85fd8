//! LoRaWAN MAC frame classification and field extraction.
//!
//! Join request / rejoin (all fields little-endian):
//!
//! | mhdr | joineui | deveui | devnonce | MIC |
//! |  1   |    8    |    8   |    2     |  4  |
//!
//! Data frame (all fields little-endian):
//!
//! | mhdr | devaddr | fctrl | fcnt | fopts | port | payload | MIC |
//! |  1   |    4    |   1   |  2   | 0-15  | 0/1  |   0-?   |  4  |

use crate::field;
use crate::filter::{netid_of, FilterConfig};
use crate::types::*;

pub const MHDR_FTYPE: u8 = 0xE0;
pub const MHDR_RFU: u8 = 0x1C;
pub const MHDR_MAJOR: u8 = 0x03;
pub const MAJOR_V1: u8 = 0x00;

pub const FRMTYPE_JREQ: u8 = 0x00;
pub const FRMTYPE_JACC: u8 = 0x20;
pub const FRMTYPE_DAUP: u8 = 0x40;
pub const FRMTYPE_DADN: u8 = 0x60;
pub const FRMTYPE_DCUP: u8 = 0x80;
pub const FRMTYPE_DCDN: u8 = 0xA0;
pub const FRMTYPE_REJOIN: u8 = 0xC0;
pub const FRMTYPE_PROP: u8 = 0xE0;

pub const OFF_MHDR: usize = 0;
pub const OFF_JOINEUI: usize = 1;
pub const OFF_DEVEUI: usize = 9;
pub const OFF_DEVNONCE: usize = 17;
pub const JREQ_LEN: usize = 23;

pub const OFF_DEVADDR: usize = 1;
pub const OFF_FCTRL: usize = 5;
pub const OFF_FCNT: usize = 6;
pub const OFF_FOPTS: usize = 8;
pub const DATA_MIN_LEN: usize = 12;

const MIC_LEN: usize = 4;

/// Frame type bits of the MHDR.
pub fn ftype(mhdr: u8) -> u8 {
    mhdr & MHDR_FTYPE
}

/// True if `frame` is too short for a data frame (and not proprietary), or
/// carries an unsupported major version / non-zero RFU bits.
pub fn is_foreign(frame: &[u8]) -> bool {
    let Some(&mhdr) = frame.first() else {
        return true;
    };
    (frame.len() < DATA_MIN_LEN && ftype(mhdr) != FRMTYPE_PROP)
        || mhdr & (MHDR_RFU | MHDR_MAJOR) != MAJOR_V1
}

/// MIC: signed little-endian 32-bit value in the last four bytes.
fn trailing_mic(frame: &[u8]) -> Result<i32, Malformed> {
    let off = frame.len().checked_sub(MIC_LEN).ok_or(Malformed::OutOfBounds {
        offset: 0,
        width: MIC_LEN,
        len: frame.len(),
    })?;
    field::le_i32(frame, off)
}

/// Decode a join request or rejoin request.
pub fn decode_join(frame: &[u8], filters: &FilterConfig) -> Result<JoinRequest, Discard> {
    if frame.len() != JREQ_LEN {
        return Err(Malformed::JoinLength {
            actual: frame.len(),
        }
        .into());
    }
    let join_eui = field::le_u64(frame, OFF_JOINEUI)?;
    if !filters.join_eui.admits(join_eui) {
        return Err(Filtered::JoinEui(join_eui).into());
    }
    let mhdr = field::u8_at(frame, OFF_MHDR)?;
    Ok(JoinRequest {
        rejoin: ftype(mhdr) == FRMTYPE_REJOIN,
        mhdr,
        join_eui,
        dev_eui: field::le_u64(frame, OFF_DEVEUI)?,
        dev_nonce: field::le_u16(frame, OFF_DEVNONCE)?,
        mic: trailing_mic(frame)?,
    })
}

/// Decode a data frame (every frame type except join/rejoin).
pub fn decode_data<'a>(frame: &'a [u8], filters: &FilterConfig) -> Result<DataFrame<'a>, Discard> {
    let len = frame.len();
    let fctrl = field::u8_at(frame, OFF_FCTRL)?;
    let fopts_len = (fctrl & 0x0F) as usize;
    let port_off = OFF_FOPTS + fopts_len;
    let mic_off = match len.checked_sub(MIC_LEN) {
        Some(off) if port_off <= off => off,
        _ => return Err(Malformed::NoRoomForMic { port_off, len }.into()),
    };

    let dev_addr = field::le_u32(frame, OFF_DEVADDR)?;
    if !filters.netid.admits(dev_addr) {
        return Err(Filtered::NetId {
            dev_addr,
            netid: netid_of(dev_addr),
        }
        .into());
    }

    let mhdr = field::u8_at(frame, OFF_MHDR)?;
    let ft = ftype(mhdr);
    let (fport, payload) = if port_off == mic_off {
        (None, &frame[mic_off..mic_off])
    } else {
        (Some(frame[port_off]), &frame[port_off + 1..mic_off])
    };

    Ok(DataFrame {
        uplink: ft == FRMTYPE_DAUP || ft == FRMTYPE_DCUP,
        mhdr,
        dev_addr,
        fctrl,
        fcnt: field::le_u16(frame, OFF_FCNT)?,
        fopts: field::bytes_at(frame, OFF_FOPTS, fopts_len)?,
        fport,
        payload,
        mic: field::le_i32(frame, mic_off)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
