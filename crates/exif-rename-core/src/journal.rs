use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use log::{Level, LevelFilter};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Destination for the messages produced while planning and transferring.
pub trait LogSink: Sync {
    fn emit(&self, level: Level, message: &str);
}

/// Discards everything.
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _level: Level, _message: &str) {}
}

/// How much is printed on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    Silent,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, silent: bool) -> Result<Self, ConfigError> {
        match (verbose, silent) {
            (true, true) => Err(ConfigError::ConflictingVerbosity),
            (true, false) => Ok(Verbosity::Verbose),
            (false, true) => Ok(Verbosity::Silent),
            (false, false) => Ok(Verbosity::Normal),
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Silent => LevelFilter::Off,
            Verbosity::Normal => LevelFilter::Info,
            Verbosity::Verbose => LevelFilter::Debug,
        }
    }

    pub fn allows(self, level: Level) -> bool {
        level <= self.level_filter()
    }
}

/// Log sink that forwards to the `log` facade and keeps every message for the log file.
///
/// Messages are recorded whatever the verbosity, so `--log` together with `--silent`
/// still produces a complete file.
pub struct Journal {
    verbosity: Verbosity,
    entries: Mutex<Vec<String>>,
}

impl Journal {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Snapshot of all recorded messages.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Write every recorded message to `path`, one per line, after a header.
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "Output log of exif-rename, {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        for line in self.entries() {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl LogSink for Journal {
    fn emit(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(format!("[{}] {}", level, message));
        }
        if self.verbosity.allows(level) {
            log::log!(level, "{}", message);
        }
    }
}
