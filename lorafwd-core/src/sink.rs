//! Output sinks and the message emitter.
//!
//! `MessageSink` receives ordered key/value fields (the structured message
//! forwarded to the network server); `DiagSink` receives one human-readable
//! line per frame. `emit` writes a decoded `UplinkMsg` to both.
//!
//! Field names and their order are part of the outbound message format.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

use crate::decode::{DecodeOptions, MacFormat};
use crate::types::*;

// ---------------------------------------------------------------------------
// Sink traits
// ---------------------------------------------------------------------------

/// A single field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Int(i64),
    /// 64-bit EUI, rendered `XX-XX-..`.
    Eui(u64),
    /// Byte string, rendered as upper-case hex.
    Bytes(&'a [u8]),
}

/// Append-only structured writer.
///
/// Members are written in call order and repeated keys are kept. An array
/// runs from `begin_array` to the next `end_array`, `begin_array` or
/// `field` call.
pub trait MessageSink {
    fn field(&mut self, key: &str, value: FieldValue<'_>);
    fn begin_array(&mut self, key: &str);
    fn array_item(&mut self, value: FieldValue<'_>);
    fn end_array(&mut self);
}

/// Append-only diagnostic text. Never fails.
pub trait DiagSink {
    fn line(&mut self, args: fmt::Arguments<'_>);
}

impl DiagSink for String {
    fn line(&mut self, args: fmt::Arguments<'_>) {
        use std::fmt::Write;
        let _ = self.write_fmt(args);
        self.push('\n');
    }
}

/// Forwards diagnostic lines to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiag;

impl DiagSink for TracingDiag {
    fn line(&mut self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "lorafwd::diag", "{}", args);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiag;

impl DiagSink for NullDiag {
    fn line(&mut self, _args: fmt::Arguments<'_>) {}
}

// ---------------------------------------------------------------------------
// JSON sink
// ---------------------------------------------------------------------------

/// Builds one JSON object as an ordered list of members.
///
/// Keys are appended, never merged: a telemetry frame with two GNSS
/// records yields two `GNSS_TS` members, in stream order, in the
/// serialized object.
#[derive(Debug, Default, Clone)]
pub struct JsonMessage {
    fields: Vec<(String, Value)>,
    open_array: Option<(String, Vec<Value>)>,
}

fn to_json(value: FieldValue<'_>) -> Value {
    match value {
        FieldValue::Str(s) => Value::String(s.to_string()),
        FieldValue::Int(i) => Value::from(i),
        FieldValue::Eui(eui) => Value::String(eui_to_string(eui)),
        FieldValue::Bytes(b) => Value::String(hex_encode(b)),
    }
}

impl JsonMessage {
    pub fn new() -> Self {
        JsonMessage::default()
    }

    /// Member keys in emission order, repeats included.
    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// First member named `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Every member named `key`, in emission order.
    pub fn get_all(&self, key: &str) -> Vec<&Value> {
        self.fields
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.open_array.is_none()
    }

    /// Serialize to compact JSON. An array left open is written last.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for JsonMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.fields.len() + usize::from(self.open_array.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        if let Some((key, items)) = &self.open_array {
            map.serialize_entry(key, items)?;
        }
        map.end()
    }
}

impl fmt::Display for JsonMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_json_string().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl MessageSink for JsonMessage {
    /// Closes an open array first so members stay in call order.
    fn field(&mut self, key: &str, value: FieldValue<'_>) {
        self.end_array();
        self.fields.push((key.to_string(), to_json(value)));
    }

    fn begin_array(&mut self, key: &str) {
        self.end_array();
        self.open_array = Some((key.to_string(), Vec::new()));
    }

    fn array_item(&mut self, value: FieldValue<'_>) {
        if let Some((_, items)) = self.open_array.as_mut() {
            items.push(to_json(value));
        }
    }

    fn end_array(&mut self) {
        if let Some((key, items)) = self.open_array.take() {
            self.fields.push((key, Value::Array(items)));
        }
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Wi-Fi MAC: beacon record with its second byte removed.
pub fn wifi_mac(record: &[u8; 8]) -> [u8; 7] {
    [
        record[0], record[2], record[3], record[4], record[5], record[6], record[7],
    ]
}

fn colon_mac(mac: &[u8; 7]) -> String {
    mac.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Write `msg` to both sinks.
pub fn emit(
    msg: &UplinkMsg<'_>,
    options: &DecodeOptions,
    out: &mut impl MessageSink,
    diag: &mut impl DiagSink,
) {
    let kind = msg.kind();
    match msg {
        UplinkMsg::Raw(payload) => {
            out.field("msgtype", FieldValue::Str(kind.as_str()));
            out.field("payload", FieldValue::Bytes(payload));
            diag.line(format_args!(
                "{kind} payload={} ({} bytes) not LoRaWAN",
                hex_encode(payload),
                payload.len()
            ));
        }
        UplinkMsg::Join(j) => emit_join(kind, j, out, diag),
        UplinkMsg::Data(d) => emit_data(kind, d, out, diag),
        UplinkMsg::Telemetry(t) => emit_telemetry(kind, t, options, out, diag),
    }
}

fn emit_join(
    kind: MsgKind,
    j: &JoinRequest,
    out: &mut impl MessageSink,
    diag: &mut impl DiagSink,
) {
    out.field("msgtype", FieldValue::Str(kind.as_str()));
    out.field("MHdr", FieldValue::Int(j.mhdr.into()));
    out.field("JoinEui", FieldValue::Eui(j.join_eui));
    out.field("DevEui", FieldValue::Eui(j.dev_eui));
    out.field("DevNonce", FieldValue::Int(j.dev_nonce.into()));
    out.field("MIC", FieldValue::Int(j.mic.into()));
    diag.line(format_args!(
        "{kind} MHdr={:02X} JoinEui={} DevEui={} DevNonce={} MIC={}",
        j.mhdr,
        eui_to_string(j.join_eui),
        eui_to_string(j.dev_eui),
        j.dev_nonce,
        j.mic
    ));
}

fn emit_data(
    kind: MsgKind,
    d: &DataFrame<'_>,
    out: &mut impl MessageSink,
    diag: &mut impl DiagSink,
) {
    out.field("msgtype", FieldValue::Str(kind.as_str()));
    out.field("MHdr", FieldValue::Int(d.mhdr.into()));
    out.field("DevAddr", FieldValue::Int((d.dev_addr as i32).into()));
    out.field("FCtrl", FieldValue::Int(d.fctrl.into()));
    out.field("FCnt", FieldValue::Int(d.fcnt.into()));
    out.field("FOpts", FieldValue::Bytes(d.fopts));
    out.field("FPort", FieldValue::Int(d.fport_value()));
    out.field("FRMPayload", FieldValue::Bytes(d.payload));
    out.field("MIC", FieldValue::Int(d.mic.into()));
    diag.line(format_args!(
        "{kind} mhdr={:02X} DevAddr={:08X} FCtrl={:02X} FCnt={} FOpts=[{}] FPort={} FRMPayload={} mic={}",
        d.mhdr,
        d.dev_addr,
        d.fctrl,
        d.fcnt,
        hex_encode(d.fopts),
        d.fport_value(),
        hex_encode(d.payload),
        d.mic
    ));
}

fn emit_telemetry(
    kind: MsgKind,
    t: &Telemetry<'_>,
    options: &DecodeOptions,
    out: &mut impl MessageSink,
    diag: &mut impl DiagSink,
) {
    out.field("msgtype", FieldValue::Str(kind.as_str()));
    out.field("DevEui", FieldValue::Eui(t.dev_eui));
    out.field("FCnt", FieldValue::Int(t.fcnt.into()));
    diag.line(format_args!(
        "{kind} DevEui={} FCnt={} records={}",
        eui_to_string(t.dev_eui),
        t.fcnt,
        t.records.len()
    ));

    for record in &t.records {
        match record {
            TelemetryRecord::Gnss {
                timestamp,
                status,
                fix,
            } => {
                out.field("GNSS_TS", FieldValue::Int((*timestamp).into()));
                out.field("GNSS_Status", FieldValue::Int((*status).into()));
                out.field("GNSS", FieldValue::Bytes(fix));
                diag.line(format_args!(
                    "GNSS: ts={timestamp} status=0x{status:08X} gnss_len={}",
                    fix.len()
                ));
            }
            TelemetryRecord::Wifi { timestamp, beacons } => {
                out.field("WiFi_TS", FieldValue::Int((*timestamp).into()));
                out.begin_array("WiFi_MACs");
                let mut count = 0usize;
                for chunk in beacons.chunks_exact(8) {
                    let mut rec = [0u8; 8];
                    rec.copy_from_slice(chunk);
                    let mac = wifi_mac(&rec);
                    match options.mac_format {
                        MacFormat::Bytes => out.array_item(FieldValue::Bytes(&mac)),
                        MacFormat::Colon => out.array_item(FieldValue::Str(&colon_mac(&mac))),
                    }
                    count += 1;
                }
                out.end_array();
                diag.line(format_args!("WiFi: ts={timestamp} macs={count}"));
            }
        }
    }

    let s = &t.status;
    if let Some(v) = s.battery {
        out.field("Batt", FieldValue::Int(v.into()));
    }
    if let Some(v) = s.energy {
        out.field("Ener", FieldValue::Int(v.into()));
    }
    if let Some(v) = s.charge_time {
        out.field("Charge", FieldValue::Int(v.into()));
    }
    if let Some(v) = s.flags {
        out.field("Flags", FieldValue::Int(v.into()));
    }
    if let Some(v) = s.resets {
        out.field("Resets", FieldValue::Int(v.into()));
    }
    if let Some(v) = s.temperature {
        out.field("Temp", FieldValue::Int(v.into()));
    }
    if !s.is_empty() {
        diag.line(format_args!(
            "Status: Batt={:?} Ener={:?} Charge={:?} Flags={:?} Resets={:?} Temp={:?}",
            s.battery, s.energy, s.charge_time, s.flags, s.resets, s.temperature
        ));
    }

    if options.raw_payload {
        out.field("payload", FieldValue::Bytes(t.raw));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_message_preserves_order() {
        let mut msg = JsonMessage::new();
        msg.field("z", FieldValue::Int(1));
        msg.field("a", FieldValue::Str("x"));
        msg.field("m", FieldValue::Bytes(&[0xAB, 0x01]));
        assert_eq!(msg.keys(), vec!["z", "a", "m"]);
        assert_eq!(msg.get("m"), Some(&Value::String("AB01".into())));
    }

    #[test]
    fn test_json_message_array() {
        let mut msg = JsonMessage::new();
        msg.begin_array("list");
        msg.array_item(FieldValue::Int(1));
        msg.array_item(FieldValue::Eui(2));
        msg.end_array();
        msg.field("after", FieldValue::Int(0));
        assert_eq!(
            msg.to_string(),
            r#"{"list":[1,"00-00-00-00-00-00-00-02"],"after":0}"#
        );
    }

    #[test]
    fn test_json_message_open_array_written_last() {
        let mut msg = JsonMessage::new();
        msg.field("a", FieldValue::Int(1));
        msg.begin_array("list");
        msg.array_item(FieldValue::Int(7));
        assert!(!msg.is_empty());
        assert_eq!(msg.to_string(), r#"{"a":1,"list":[7]}"#);
    }

    #[test]
    fn test_field_closes_open_array() {
        let mut msg = JsonMessage::new();
        msg.begin_array("list");
        msg.array_item(FieldValue::Int(7));
        msg.field("after", FieldValue::Int(0));
        // Items after the scalar have no open array to land in
        msg.array_item(FieldValue::Int(8));
        msg.end_array();
        assert_eq!(msg.keys(), vec!["list", "after"]);
        assert_eq!(msg.to_string(), r#"{"list":[7],"after":0}"#);
    }

    #[test]
    fn test_repeated_keys_kept_in_order() {
        let mut msg = JsonMessage::new();
        msg.field("ts", FieldValue::Int(1));
        msg.field("other", FieldValue::Int(5));
        msg.field("ts", FieldValue::Int(2));
        assert_eq!(msg.keys(), vec!["ts", "other", "ts"]);
        assert_eq!(msg.get("ts"), Some(&Value::from(1)));
        assert_eq!(msg.get_all("ts"), vec![&Value::from(1), &Value::from(2)]);
        assert_eq!(msg.to_string(), r#"{"ts":1,"other":5,"ts":2}"#);
    }

    #[test]
    fn test_string_diag_appends_lines() {
        let mut diag = String::new();
        diag.line(format_args!("one {}", 1));
        diag.line(format_args!("two"));
        assert_eq!(diag, "one 1\ntwo\n");
    }

    #[test]
    fn test_wifi_mac_drops_second_byte() {
        let rec = [0xAA, 0xC5, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        assert_eq!(wifi_mac(&rec), [0xAA, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(colon_mac(&wifi_mac(&rec)), "AA:01:02:03:04:05:06");
    }

    #[test]
    fn test_emit_raw() {
        let mut out = JsonMessage::new();
        let mut diag = String::new();
        emit(
            &UplinkMsg::Raw(&[0x20, 0x01]),
            &DecodeOptions::default(),
            &mut out,
            &mut diag,
        );
        assert_eq!(out.keys(), vec!["msgtype", "payload"]);
        assert_eq!(out.get("msgtype"), Some(&Value::String("lora".into())));
        assert_eq!(out.get("payload"), Some(&Value::String("2001".into())));
        assert!(diag.starts_with("lora payload=2001"));
    }

    #[test]
    fn test_emit_status_only_present_fields() {
        let t = Telemetry {
            dev_eui: 1,
            fcnt: 9,
            records: Vec::new(),
            status: DeviceStatus {
                battery: Some(3000),
                temperature: Some(-5),
                ..DeviceStatus::default()
            },
            raw: &[0x01],
        };
        let options = DecodeOptions {
            raw_payload: false,
            ..DecodeOptions::default()
        };
        let mut out = JsonMessage::new();
        emit(&UplinkMsg::Telemetry(t), &options, &mut out, &mut NullDiag);
        assert_eq!(out.keys(), vec!["msgtype", "DevEui", "FCnt", "Batt", "Temp"]);
        assert_eq!(out.get("Temp"), Some(&Value::from(-5)));
    }
}
