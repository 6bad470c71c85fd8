//! Decode raw radio frames into structured messages.
//!
//! Classification order:
//! - empty frame:                            malformed
//! - `0x01 .. 0x41` device header, >= 14 B:  proprietary telemetry
//! - too short / unsupported major version:  raw `lora` pass-through
//! - join request / rejoin:                  `jreq` / `rejoin`
//! - everything else:                        data frame, `updf` / `dndf`
//!
//! Malformed and filtered frames emit nothing; they come back as `Discard`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::FilterConfig;
use crate::frame::{self, FRMTYPE_JREQ, FRMTYPE_REJOIN};
use crate::sink::{emit, DiagSink, MessageSink};
use crate::telemetry;
use crate::types::*;

/// How Wi-Fi MAC addresses are written to the structured message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacFormat {
    /// 7-byte string (hex in JSON).
    #[default]
    Bytes,
    /// `AA:BB:CC:DD:EE:FF:00`.
    Colon,
}

/// Output options for the structured message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub mac_format: MacFormat,
    /// Append the complete frame as `payload` to telemetry messages.
    pub raw_payload: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            mac_format: MacFormat::Bytes,
            raw_payload: true,
        }
    }
}

/// Classify and decode `frame` without writing anything.
pub fn decode_frame<'a>(frame: &'a [u8], filters: &FilterConfig) -> Result<UplinkMsg<'a>, Discard> {
    if frame.is_empty() {
        return Err(Malformed::Empty.into());
    }

    if telemetry::is_telemetry(frame) {
        return Ok(UplinkMsg::Telemetry(telemetry::decode_telemetry(frame)?));
    }

    if frame::is_foreign(frame) {
        return Ok(UplinkMsg::Raw(frame));
    }

    match frame::ftype(frame[0]) {
        FRMTYPE_JREQ | FRMTYPE_REJOIN => frame::decode_join(frame, filters).map(UplinkMsg::Join),
        _ => frame::decode_data(frame, filters).map(UplinkMsg::Data),
    }
}

/// Decode `frame` and write the result to `out` and `diag`.
///
/// On success returns the emitted kind and whether it was a LoRaWAN MAC
/// frame. On `Err` nothing was written to `out`; `diag` gets the reason.
pub fn parse_lora_frame(
    frame: &[u8],
    filters: &FilterConfig,
    options: &DecodeOptions,
    out: &mut impl MessageSink,
    diag: &mut impl DiagSink,
) -> Result<Emitted, Discard> {
    match decode_frame(frame, filters) {
        Ok(msg) => {
            let kind = msg.kind();
            debug!(len = frame.len(), %kind, "frame decoded");
            emit(&msg, options, out, diag);
            Ok(Emitted {
                kind,
                is_lorawan: kind.is_lorawan(),
            })
        }
        Err(discard) => {
            debug!(len = frame.len(), reason = %discard, "frame discarded");
            match &discard {
                Discard::Filtered(f) => diag.line(format_args!("{f}")),
                Discard::Malformed(m) => diag.line(format_args!(
                    "Not a frame ({m}): {}",
                    hex_encode(&frame[..frame.len().min(16)])
                )),
            }
            Err(discard)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
