//! lorafwd: LoRa gateway frame decoder and beacon builder.
//!
//! Supports:
//! - Decoding hex frame captures into the JSON messages a gateway forwards
//! - Building Class B beacon PDUs
//! - Showing and initializing the config file

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lorafwd_core::config::{self, Config};
use lorafwd_core::sink::NullDiag;
use lorafwd_core::{
    build_beacon, parse_lora_frame, BeaconLayout, DecodeOptions, Discard, FilterStore,
    JsonMessage, MacFormat, TracingDiag,
};

mod capture;

use capture::{CaptureLine, FrameReader};

#[derive(Parser)]
#[command(name = "lorafwd", version, about = "LoRa gateway frame decoder")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode hex frames from a file and print one JSON message per line
    Decode {
        /// Path to file containing hex frames (one per line, `-` for stdin)
        file: PathBuf,

        /// Config file (default: ~/.lorafwd/config.json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Wi-Fi MAC rendering
        #[arg(long, value_enum)]
        mac_format: Option<MacFormatArg>,

        /// Omit the raw payload from telemetry messages
        #[arg(long)]
        no_raw_payload: bool,

        /// Print per-frame diagnostic lines to stderr
        #[arg(long)]
        diag: bool,
    },

    /// Build a beacon PDU and print it as hex
    Beacon {
        /// GPS epoch seconds
        #[arg(long, allow_hyphen_values = true)]
        epoch: i64,

        /// Info descriptor byte
        #[arg(long, default_value = "0")]
        infodesc: u8,

        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Regional layout preset
        #[arg(long, value_enum, conflicts_with = "layout")]
        region: Option<Region>,

        /// Explicit layout as time_off,infodesc_off,bcn_len
        #[arg(long, value_parser = parse_layout)]
        layout: Option<BeaconLayout>,

        /// Config file (default: ~/.lorafwd/config.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show or initialize the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the default config
    Init {
        /// Destination (default: ~/.lorafwd/config.json)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MacFormatArg {
    Bytes,
    Colon,
}

impl From<MacFormatArg> for MacFormat {
    fn from(arg: MacFormatArg) -> Self {
        match arg {
            MacFormatArg::Bytes => MacFormat::Bytes,
            MacFormatArg::Colon => MacFormat::Colon,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Region {
    Eu868,
    Us915,
}

impl Region {
    fn layout(self) -> BeaconLayout {
        match self {
            Region::Eu868 => BeaconLayout::EU868,
            Region::Us915 => BeaconLayout::US915,
        }
    }
}

fn parse_layout(s: &str) -> Result<BeaconLayout, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u8>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let raw: [u8; 3] = parts
        .try_into()
        .map_err(|_| "expected three comma-separated offsets".to_string())?;
    let layout = BeaconLayout::from(raw);
    layout.validate().map_err(|e| e.to_string())?;
    Ok(layout)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decode {
            file,
            config,
            mac_format,
            no_raw_payload,
            diag,
        } => cmd_decode(&file, config.as_deref(), mac_format, no_raw_payload, diag),
        Commands::Beacon {
            epoch,
            infodesc,
            lat,
            lon,
            region,
            layout,
            config,
        } => {
            let layout = layout
                .or(region.map(Region::layout))
                .unwrap_or_else(|| load(config.as_deref()).beacon.layout);
            cmd_beacon(&layout, epoch, infodesc, lat, lon)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()),
            ConfigAction::Init { path, force } => cmd_config_init(path, force),
        },
    }
}

/// Explicit path: must be readable. Default path: falls back to defaults.
fn load(path: Option<&Path>) -> Config {
    match path {
        Some(p) => config::read_config(p).unwrap_or_else(|e| {
            eprintln!("Error reading config {}: {e}", p.display());
            std::process::exit(1);
        }),
        None => config::load_config(),
    }
}

#[derive(Default)]
struct DecodeStats {
    frames: u64,
    emitted: u64,
    lorawan: u64,
    malformed: u64,
    filtered: u64,
    controls: u64,
}

fn cmd_decode(
    file: &Path,
    config_path: Option<&Path>,
    mac_format: Option<MacFormatArg>,
    no_raw_payload: bool,
    diag: bool,
) {
    let config = load(config_path);
    let mut options: DecodeOptions = config.decode;
    if let Some(fmt) = mac_format {
        options.mac_format = fmt.into();
    }
    if no_raw_payload {
        options.raw_payload = false;
    }

    let filters = config.filters().unwrap_or_else(|e| {
        eprintln!("Error in filter config: {e}");
        std::process::exit(1);
    });
    let store = FilterStore::new(filters);

    let (lines, bad) = FrameReader::new(file).read_all().unwrap_or_else(|e| {
        eprintln!("Error opening {}: {e}", file.display());
        std::process::exit(1);
    });
    for b in &bad {
        warn!(line = b.line_no, text = %b.text, "skipping unparseable line");
    }

    let mut stats = DecodeStats::default();
    let mut snapshot = store.snapshot();

    for line in lines {
        let frame = match line {
            CaptureLine::Frame(frame) => frame,
            CaptureLine::Control(msg) => {
                if msg.get("msgtype").and_then(|v| v.as_str()) != Some("router_config") {
                    debug!(%msg, "ignoring control message");
                    continue;
                }
                match config::filters_from_router_config(&msg) {
                    Ok(filters) => {
                        store.publish(filters);
                        snapshot = store.snapshot();
                        stats.controls += 1;
                    }
                    Err(e) => warn!(error = %e, "rejecting router_config"),
                }
                continue;
            }
        };

        stats.frames += 1;
        let mut out = JsonMessage::new();
        let result = if diag {
            let mut text = String::new();
            let r = parse_lora_frame(&frame, &snapshot, &options, &mut out, &mut text);
            eprint!("{text}");
            r
        } else if diag_traced() {
            parse_lora_frame(&frame, &snapshot, &options, &mut out, &mut TracingDiag)
        } else {
            parse_lora_frame(&frame, &snapshot, &options, &mut out, &mut NullDiag)
        };

        match result {
            Ok(emitted) => {
                stats.emitted += 1;
                if emitted.is_lorawan {
                    stats.lorawan += 1;
                }
                println!("{out}");
            }
            Err(Discard::Malformed(_)) => stats.malformed += 1,
            Err(Discard::Filtered(_)) => stats.filtered += 1,
        }
    }

    info!(
        frames = stats.frames,
        emitted = stats.emitted,
        router_configs = stats.controls,
        "decode finished"
    );
    eprintln!(
        "{} frames: {} emitted ({} LoRaWAN), {} malformed, {} filtered",
        stats.frames, stats.emitted, stats.lorawan, stats.malformed, stats.filtered
    );
}

fn diag_traced() -> bool {
    tracing::enabled!(target: "lorafwd::diag", tracing::Level::DEBUG)
}

fn cmd_beacon(layout: &BeaconLayout, epoch: i64, infodesc: u8, lat: f64, lon: f64) {
    match build_beacon(layout, epoch, infodesc, lat, lon) {
        Ok(pdu) => println!("{}", lorafwd_core::hex_encode(&pdu)),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_config_show(path: Option<&Path>) {
    let config = load(path);
    match serde_json::to_string_pretty(&config) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_config_init(path: Option<PathBuf>, force: bool) {
    let target = path.clone().unwrap_or_else(config::config_file);
    if target.exists() && !force {
        eprintln!("{} already exists (use --force to overwrite)", target.display());
        std::process::exit(1);
    }
    let result = match &path {
        Some(p) => config::write_config(p, &Config::default()).map(|()| p.clone()),
        None => config::save_config(&Config::default()),
    };
    match result {
        Ok(written) => eprintln!("Wrote {}", written.display()),
        Err(e) => {
            eprintln!("Error writing {}: {e}", target.display());
            std::process::exit(1);
        }
    }
}
