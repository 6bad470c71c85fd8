//! Configuration file management for lorafwd.
//!
//! Reads/writes `~/.lorafwd/config.json` with filter settings, decode
//! options, and the beacon layout. Also parses the `JoinEui` / `NetID`
//! filter fields of a network server `router_config` message.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::beacon::BeaconLayout;
use crate::decode::DecodeOptions;
use crate::filter::{FilterConfig, JoinEuiFilter, NetIdFilter, NETID_COUNT};
use crate::types::{eui_from_str, eui_to_string, ConfigError};

/// An EUI written either as an integer or as a hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EuiValue {
    Int(u64),
    Text(String),
}

impl EuiValue {
    pub fn to_u64(&self) -> Result<u64, ConfigError> {
        match self {
            EuiValue::Int(v) => Ok(*v),
            EuiValue::Text(s) => eui_from_str(s).ok_or_else(|| ConfigError::InvalidEui(s.clone())),
        }
    }
}

impl From<u64> for EuiValue {
    fn from(v: u64) -> Self {
        EuiValue::Text(eui_to_string(v))
    }
}

/// Beacon settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub layout: BeaconLayout,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        BeaconConfig {
            layout: BeaconLayout::EU868,
        }
    }
}

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inclusive JoinEUI ranges. Empty admits every JoinEUI.
    pub join_eui_filter: Vec<[EuiValue; 2]>,
    /// Admitted NetIDs. `None` admits every NetID.
    pub netid_filter: Option<Vec<u64>>,
    pub decode: DecodeOptions,
    pub beacon: BeaconConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            join_eui_filter: Vec::new(),
            netid_filter: None,
            decode: DecodeOptions::default(),
            beacon: BeaconConfig::default(),
        }
    }
}

impl Config {
    /// Build the filter snapshot described by this config.
    pub fn filters(&self) -> Result<FilterConfig, ConfigError> {
        let ranges = self
            .join_eui_filter
            .iter()
            .map(|[lo, hi]| Ok((lo.to_u64()?, hi.to_u64()?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let netid = match &self.netid_filter {
            None => NetIdFilter::default(),
            Some(ids) => NetIdFilter::allow_only(netid_list(ids)?),
        };
        Ok(FilterConfig {
            join_eui: JoinEuiFilter::new(ranges),
            netid,
        })
    }

    /// Check everything that can be wrong without decoding a frame.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filters()?;
        self.beacon.layout.validate()?;
        Ok(())
    }
}

fn netid_list(ids: &[u64]) -> Result<Vec<u8>, ConfigError> {
    ids.iter()
        .map(|&id| {
            if id < NETID_COUNT as u64 {
                Ok(id as u8)
            } else {
                Err(ConfigError::InvalidNetId(id))
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// router_config
// ---------------------------------------------------------------------------

/// Filters from a `router_config` message: `JoinEui` is a list of
/// `[lo, hi]` pairs, `NetID` a list of admitted NetIDs. Missing or null
/// fields leave that filter open.
pub fn filters_from_router_config(msg: &Value) -> Result<FilterConfig, ConfigError> {
    let join_eui_filter: Vec<[EuiValue; 2]> = match msg.get("JoinEui") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone())?,
    };
    let netid_filter: Option<Vec<u64>> = match msg.get("NetID") {
        None | Some(Value::Null) => None,
        Some(v) => Some(serde_json::from_value(v.clone())?),
    };
    Config {
        join_eui_filter,
        netid_filter,
        ..Config::default()
    }
    .filters()
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Get the config directory path (`~/.lorafwd/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".lorafwd")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Read and parse a config file.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

/// Load config from `~/.lorafwd/config.json`.
///
/// Returns default config if the file doesn't exist or can't be used.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    match read_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unusable config file");
            Config::default()
        }
    }
}

/// Write `config` to `path`, creating parent directories.
pub fn write_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let text = serde_json::to_string_pretty(config)?;
    std::fs::write(path, text + "\n")?;
    Ok(())
}

/// Save config to `~/.lorafwd/config.json`.
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_file();
    write_config(&path, config)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
