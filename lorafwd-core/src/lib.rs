//! lorafwd-core: LoRa gateway frame decoding and beacon construction.
//!
//! No async, no sockets. Turns raw radio frames into structured messages
//! for a network server, applies the gateway's JoinEUI/NetID filters, and
//! builds Class B beacon PDUs. The `lorafwd` CLI is a thin shell over it.

pub mod beacon;
pub mod config;
pub mod crc;
pub mod decode;
pub mod field;
pub mod filter;
pub mod frame;
pub mod sink;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use beacon::{build_beacon, verify_beacon, BeaconLayout};
pub use crc::crc16;
pub use decode::{decode_frame, parse_lora_frame, DecodeOptions, MacFormat};
pub use filter::{FilterConfig, FilterStore, JoinEuiFilter, NetIdFilter};
pub use sink::{DiagSink, JsonMessage, MessageSink, TracingDiag};
pub use types::*;
