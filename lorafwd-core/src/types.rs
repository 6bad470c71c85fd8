//! Shared types, error enums, and decoded message types for lorafwd-core.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("empty frame")]
    Empty,
    #[error("join frame must be 23 bytes, got {actual}")]
    JoinLength { actual: usize },
    #[error("no room for MIC: port offset {port_off} in {len}-byte frame")]
    NoRoomForMic { port_off: usize, len: usize },
    #[error("read of {width} bytes at offset {offset} past end of {len}-byte frame")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },
    #[error("record 0x{tag:02X} at offset {offset} declares {size} bytes, frame has {len}")]
    Truncated {
        tag: u8,
        offset: usize,
        size: usize,
        len: usize,
    },
    #[error("record 0x{tag:02X} declares impossible size {size}")]
    RecordSize { tag: u8, size: usize },
}

/// Why a well-formed frame was dropped by the identifier filters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Filtered {
    #[error("Join EUI {} filtered", dashed(.0))]
    JoinEui(u64),
    #[error("DevAddr={dev_addr:08X} with NetID={netid} filtered")]
    NetId { dev_addr: u32, netid: u8 },
}

/// A frame that produced no message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Discard {
    #[error("malformed frame: {0}")]
    Malformed(#[from] Malformed),
    #[error("{0}")]
    Filtered(#[from] Filtered),
}

/// Beacon layout or buffer problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeaconError {
    #[error("invalid beacon layout: {0}")]
    Layout(String),
    #[error("beacon buffer is {actual} bytes, layout needs {expected}")]
    Length { expected: usize, actual: usize },
}

/// Configuration loading and parsing errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid EUI: {0}")]
    InvalidEui(String),
    #[error("NetID out of range: {0}")]
    InvalidNetId(u64),
    #[error(transparent)]
    Layout(#[from] BeaconError),
}

// ---------------------------------------------------------------------------
// EUI helpers
// ---------------------------------------------------------------------------

/// Format a 64-bit EUI as `XX-XX-XX-XX-XX-XX-XX-XX`, most significant byte first.
pub fn eui_to_string(eui: u64) -> String {
    let b = eui.to_be_bytes();
    format!(
        "{:02X}-{:02X}-{:02X}-{:02X}-{:02X}-{:02X}-{:02X}-{:02X}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
    )
}

fn dashed(eui: &u64) -> String {
    eui_to_string(*eui)
}

/// Parse an EUI written as 16 hex digits, optionally separated by `-` or `:`.
pub fn eui_from_str(s: &str) -> Option<u64> {
    let digits: String = s
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != ':')
        .collect();
    if digits.len() != 16 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(&digits, 16).ok()
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if !hex.len().is_multiple_of(2) {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// The `msgtype` tag of an emitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    /// Join request.
    Jreq,
    /// Rejoin request.
    Rejoin,
    /// Data frame, uplink direction.
    Updf,
    /// Data frame, downlink direction (join accept, unconfirmed/confirmed down, proprietary).
    Dndf,
    /// Not LoRaWAN: forwarded as an opaque payload.
    Lora,
    /// Proprietary telemetry with status fields only.
    Status,
    Gnss,
    Wifi,
    GnssWifi,
}

impl MsgKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgKind::Jreq => "jreq",
            MsgKind::Rejoin => "rejoin",
            MsgKind::Updf => "updf",
            MsgKind::Dndf => "dndf",
            MsgKind::Lora => "lora",
            MsgKind::Status => "status",
            MsgKind::Gnss => "gnss",
            MsgKind::Wifi => "wifi",
            MsgKind::GnssWifi => "gnss_wifi",
        }
    }

    /// True for standard LoRaWAN MAC frames.
    pub fn is_lorawan(&self) -> bool {
        matches!(
            self,
            MsgKind::Jreq | MsgKind::Rejoin | MsgKind::Updf | MsgKind::Dndf
        )
    }
}

impl std::fmt::Display for MsgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decoded message types
// ---------------------------------------------------------------------------

/// Join request or rejoin request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub rejoin: bool,
    pub mhdr: u8,
    pub join_eui: u64,
    pub dev_eui: u64,
    pub dev_nonce: u16,
    pub mic: i32,
}

/// LoRaWAN data frame. Byte fields borrow from the decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame<'a> {
    pub uplink: bool,
    pub mhdr: u8,
    pub dev_addr: u32,
    pub fctrl: u8,
    pub fcnt: u16,
    pub fopts: &'a [u8],
    pub fport: Option<u8>,
    pub payload: &'a [u8],
    pub mic: i32,
}

impl DataFrame<'_> {
    /// FPort as emitted: the port byte, or -1 when the frame has none.
    pub fn fport_value(&self) -> i64 {
        self.fport.map_or(-1, i64::from)
    }
}

/// One variable-length record of a telemetry frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryRecord<'a> {
    Gnss {
        timestamp: u32,
        status: u32,
        fix: &'a [u8],
    },
    Wifi {
        timestamp: u32,
        /// Whole 8-byte beacon records; a trailing partial record is excluded.
        beacons: &'a [u8],
    },
}

/// Fixed-width status fields. Each is `Some` only when its tag was present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    pub battery: Option<u16>,
    pub energy: Option<u32>,
    pub charge_time: Option<u32>,
    pub flags: Option<u8>,
    pub resets: Option<u32>,
    pub temperature: Option<i8>,
}

impl DeviceStatus {
    pub fn is_empty(&self) -> bool {
        *self == DeviceStatus::default()
    }
}

/// Proprietary telemetry frame: device header, records, status fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry<'a> {
    pub dev_eui: u64,
    pub fcnt: u32,
    pub records: Vec<TelemetryRecord<'a>>,
    pub status: DeviceStatus,
    /// The complete original frame.
    pub raw: &'a [u8],
}

impl Telemetry<'_> {
    pub fn kind(&self) -> MsgKind {
        let gnss = self
            .records
            .iter()
            .any(|r| matches!(r, TelemetryRecord::Gnss { .. }));
        let wifi = self
            .records
            .iter()
            .any(|r| matches!(r, TelemetryRecord::Wifi { .. }));
        match (gnss, wifi) {
            (true, true) => MsgKind::GnssWifi,
            (true, false) => MsgKind::Gnss,
            (false, true) => MsgKind::Wifi,
            (false, false) => MsgKind::Status,
        }
    }
}

/// Union of everything the decoder can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UplinkMsg<'a> {
    Join(JoinRequest),
    Data(DataFrame<'a>),
    Raw(&'a [u8]),
    Telemetry(Telemetry<'a>),
}

impl UplinkMsg<'_> {
    pub fn kind(&self) -> MsgKind {
        match self {
            UplinkMsg::Join(j) if j.rejoin => MsgKind::Rejoin,
            UplinkMsg::Join(_) => MsgKind::Jreq,
            UplinkMsg::Data(d) if d.uplink => MsgKind::Updf,
            UplinkMsg::Data(_) => MsgKind::Dndf,
            UplinkMsg::Raw(_) => MsgKind::Lora,
            UplinkMsg::Telemetry(t) => t.kind(),
        }
    }

    pub fn is_lorawan(&self) -> bool {
        self.kind().is_lorawan()
    }
}

/// Result of a decode call that emitted a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitted {
    pub kind: MsgKind,
    pub is_lorawan: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eui_to_string() {
        assert_eq!(
            eui_to_string(0x0102_0304_0506_0708),
            "01-02-03-04-05-06-07-08"
        );
        assert_eq!(eui_to_string(0), "00-00-00-00-00-00-00-00");
    }

    #[test]
    fn test_eui_from_str() {
        assert_eq!(
            eui_from_str("01-02-03-04-05-06-07-08"),
            Some(0x0102_0304_0506_0708)
        );
        assert_eq!(eui_from_str("0102030405060708"), Some(0x0102_0304_0506_0708));
        assert_eq!(eui_from_str("01:02:03:04:05:06:07:ff"), Some(0x0102_0304_0506_07FF));
        assert_eq!(eui_from_str("0102"), None);
        assert_eq!(eui_from_str("zz-02-03-04-05-06-07-08"), None);
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode("4840D6"), Some(vec![0x48, 0x40, 0xD6]));
        assert_eq!(hex_decode("odd"), None);
        assert_eq!(hex_decode("ZZZZ"), None);
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x48, 0x40, 0xD6]), "4840D6");
        assert_eq!(hex_encode(&[]), "");
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(MsgKind::GnssWifi.as_str(), "gnss_wifi");
        assert_eq!(MsgKind::Updf.to_string(), "updf");
        assert!(MsgKind::Jreq.is_lorawan());
        assert!(!MsgKind::Lora.is_lorawan());
        assert!(!MsgKind::Status.is_lorawan());
    }

    #[test]
    fn test_filtered_display() {
        let f = Filtered::NetId {
            dev_addr: 0x0A00_0001,
            netid: 5,
        };
        assert_eq!(f.to_string(), "DevAddr=0A000001 with NetID=5 filtered");
        assert!(Filtered::JoinEui(1)
            .to_string()
            .contains("00-00-00-00-00-00-00-01"));
    }

    #[test]
    fn test_fport_value() {
        let mut d = DataFrame {
            uplink: true,
            mhdr: 0x40,
            dev_addr: 0,
            fctrl: 0,
            fcnt: 0,
            fopts: &[],
            fport: None,
            payload: &[],
            mic: 0,
        };
        assert_eq!(d.fport_value(), -1);
        d.fport = Some(200);
        assert_eq!(d.fport_value(), 200);
    }
}
