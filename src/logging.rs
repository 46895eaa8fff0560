//! Log Backend
//!
//! The queue modules log through the `log` facade only:
//! - trace: rejected offers and interrupted polls
//! - debug: every suspend/resume crossing
//! - info: queue and tracker construction
//! - warn: items refused by a backing queue
//!
//! Any `log` backend picks these up. [`WatermarkLogger`] is a small one for
//! embedders that want crossings written as timestamped text or JSON lines,
//! to stderr or appended to a file.

use anyhow::{Context, Result};
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

/// One record in `LogFormat::Json` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub format: LogFormat,
    /// Append to this file instead of writing to stderr
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            format: LogFormat::Text,
            file: None,
        }
    }
}

enum Sink {
    Stderr,
    File(Mutex<File>),
}

/// `log` backend writing one line per record
pub struct WatermarkLogger {
    level: LevelFilter,
    format: LogFormat,
    sink: Sink,
}

impl WatermarkLogger {
    /// Build a logger, opening the log file up front if one is configured
    pub fn new(config: LogConfig) -> Result<Self> {
        let sink = match &config.file {
            None => Sink::Stderr,
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                Sink::File(Mutex::new(file))
            }
        };

        Ok(Self {
            level: config.level,
            format: config.format,
            sink,
        })
    }

    fn format_record(&self, record: &Record<'_>) -> String {
        let line = LogLine {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            level: record.level().as_str().to_string(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };

        match self.format {
            LogFormat::Text => Self::text_line(&line),
            LogFormat::Json => serde_json::to_string(&line).unwrap_or_else(|_| Self::text_line(&line)),
        }
    }

    fn text_line(line: &LogLine) -> String {
        format!("{} [{}] {}: {}", line.timestamp, line.level, line.target, line.message)
    }
}

impl Log for WatermarkLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = self.format_record(record);
        let written = match &self.sink {
            Sink::Stderr => writeln!(io::stderr().lock(), "{}", line),
            Sink::File(file) => writeln!(file.lock(), "{}", line),
        };
        if let Err(e) = written {
            eprintln!("Log write error: {}", e);
        }
    }

    fn flush(&self) {
        let _ = match &self.sink {
            Sink::Stderr => io::stderr().flush(),
            Sink::File(file) => file.lock().flush(),
        };
    }
}

/// Install a `WatermarkLogger` as the global `log` backend
pub fn init_logger(config: LogConfig) -> Result<()> {
    let level = config.level;
    let logger = WatermarkLogger::new(config)?;

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(level);
    Ok(())
}

/// Parse a level name such as `debug` or `OFF`
pub fn parse_log_level(level_str: &str) -> Result<LevelFilter> {
    level_str.parse::<LevelFilter>().map_err(|_| {
        anyhow::anyhow!(
            "Invalid log level: {}. Valid levels: off, error, warn, info, debug, trace",
            level_str
        )
    })
}
