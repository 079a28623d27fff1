//! CLI argument parsing for convertdrv

use crate::context::ConversionStats;
use crate::driver::ConvertDriver;
use crate::endpoint::ConversionEndpoint;
use crate::error::DriverError;
use crate::miscdev::OpenFile;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Output format for operation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// One JSON object per operation
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "convertdrv")]
#[command(version)]
#[command(about = "Temperature conversion misc device driven from the command line", long_about = None)]
pub struct Cli {
    /// TOML configuration for the device node
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output (to stderr)
    #[arg(long)]
    pub debug: bool,

    /// Operations to run in order: write:<TOKEN>, read, stats, seek.
    /// Read from stdin, one per line, when none are given.
    #[arg(value_name = "OP")]
    pub ops: Vec<Op>,
}

/// One operation against the open device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(Vec<u8>),
    Read,
    Stats,
    Seek,
}

impl FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(token) = s.strip_prefix("write:").or_else(|| s.strip_prefix("w:")) {
            return Ok(Op::Write(unescape(token)?));
        }
        match s {
            "read" | "r" => Ok(Op::Read),
            "stats" => Ok(Op::Stats),
            "seek" => Ok(Op::Seek),
            _ => Err(format!(
                "unknown operation '{}'. Expected write:<TOKEN>, read, stats or seek",
                s
            )),
        }
    }
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Write(_) => "write",
            Op::Read => "read",
            Op::Stats => "stats",
            Op::Seek => "seek",
        }
    }

    /// Run this operation on `file`, an open handle of `driver`
    pub fn run(&self, driver: &ConvertDriver, file: &OpenFile<ConversionEndpoint>) -> OpReport {
        let mut report = OpReport::new(self.name());
        let outcome = match self {
            Op::Write(token) => file.write(token).map(|n| report.bytes = Some(n)),
            Op::Read => {
                let mut buf = [0u8; 64];
                file.read(&mut buf).map(|n| {
                    report.bytes = Some(n);
                    report.value = Some(String::from_utf8_lossy(&buf[..n]).into_owned());
                })
            }
            Op::Stats => {
                report.stats = Some(driver.stats());
                Ok(())
            }
            Op::Seek => file.seek(0).map(|pos| report.bytes = Some(pos as usize)),
        };
        if let Err(e) = outcome {
            report.fail(&e);
        }
        report
    }
}

/// Expand `\n`, `\0` and `\\` escapes in a token
fn unescape(token: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(token.len());
    let mut bytes = token.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'0') => out.push(0),
            Some(b'\\') => out.push(b'\\'),
            Some(other) => return Err(format!("unsupported escape '\\{}'", other as char)),
            None => return Err("dangling '\\' at end of token".to_string()),
        }
    }
    Ok(out)
}

/// Result of one operation, as printed by the binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpReport {
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ConversionStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<&'static str>,
}

impl OpReport {
    fn new(op: &'static str) -> Self {
        Self {
            op,
            ok: true,
            bytes: None,
            value: None,
            stats: None,
            error: None,
            errno: None,
        }
    }

    fn fail(&mut self, err: &DriverError) {
        self.ok = false;
        self.bytes = None;
        self.value = None;
        self.error = Some(err.to_string());
        self.errno = Some(err.errno_name());
    }

    /// Single-line text rendering
    pub fn to_text(&self) -> String {
        if let (Some(error), Some(errno)) = (&self.error, self.errno) {
            return format!("{}: error: {} ({})", self.op, error, errno);
        }
        match (&self.value, self.bytes, &self.stats) {
            (Some(value), _, _) => format!("{}: {}", self.op, value),
            (None, _, Some(stats)) => {
                format!("{}: reads={} writes={}", self.op, stats.reads, stats.writes)
            }
            (None, Some(bytes), None) => format!("{}: {} bytes", self.op, bytes),
            (None, None, None) => format!("{}: ok", self.op),
        }
    }
}
