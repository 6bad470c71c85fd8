//! Capture file input.
//!
//! One item per line:
//! - plain hex (`40010203...`), optionally spaced (`40 01 02 ...`)
//! - wrapped hex (`*40010203...;`)
//! - a JSON object: a control message such as `router_config`
//!
//! Blank lines and `#` comments are skipped. `-` reads stdin.

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use serde_json::Value;

use lorafwd_core::types::hex_decode;

/// One usable line of a capture.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureLine {
    Frame(Vec<u8>),
    Control(Value),
}

/// A line that is neither a frame nor a control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadLine {
    pub line_no: usize,
    pub text: String,
}

pub struct FrameReader {
    path: PathBuf,
}

impl FrameReader {
    pub fn new(path: &Path) -> Self {
        FrameReader {
            path: path.to_path_buf(),
        }
    }

    /// Read every line, keeping the usable ones in order.
    pub fn read_all(&self) -> io::Result<(Vec<CaptureLine>, Vec<BadLine>)> {
        if self.path.as_os_str() == "-" {
            read_lines(io::stdin().lock())
        } else {
            read_lines(io::BufReader::new(fs::File::open(&self.path)?))
        }
    }
}

pub fn read_lines(reader: impl BufRead) -> io::Result<(Vec<CaptureLine>, Vec<BadLine>)> {
    let mut items = Vec::new();
    let mut bad = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_line(&line) {
            Some(Ok(item)) => items.push(item),
            Some(Err(())) => bad.push(BadLine {
                line_no: i + 1,
                text: line.trim().to_string(),
            }),
            None => {}
        }
    }
    Ok((items, bad))
}

/// `None` for lines to skip, `Err` for lines that can't be used.
fn parse_line(line: &str) -> Option<Result<CaptureLine, ()>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if line.starts_with('{') {
        return Some(
            serde_json::from_str::<Value>(line)
                .map(CaptureLine::Control)
                .map_err(|_| ()),
        );
    }
    Some(
        clean_hex_line(line)
            .and_then(|hex| hex_decode(&hex))
            .map(CaptureLine::Frame)
            .ok_or(()),
    )
}

/// Extract a hex frame string from a line.
///
/// Handles plain hex, `*hex;` wrapping, and whitespace between bytes.
pub fn clean_hex_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let inner = match line.strip_prefix('*').and_then(|l| l.strip_suffix(';')) {
        Some(inner) => inner,
        None => line,
    };
    let hex: String = inner.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if is_valid_hex(&hex) {
        Some(hex.to_ascii_uppercase())
    } else {
        None
    }
}

fn is_valid_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
