//! Append-only CSV telemetry log used to collect model training data.
//!
//! # Format
//!
//! ```text
//! timestamp,current_ma,brightness,avg_cpu_freq,gpu_load,wifi_kbps,cell_kbps
//! 1718000000,452,1200,1400000,12.5,3,0
//! ```
//!
//! The header is written only when the file is new or empty, so repeated
//! recording runs extend the same log. Every row is flushed as written.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::delta::Deltas;

pub const CSV_HEADER: &str =
    "timestamp,current_ma,brightness,avg_cpu_freq,gpu_load,wifi_kbps,cell_kbps";

/// One logged cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRow {
    pub timestamp: i64,
    pub current_ma: i64,
    pub brightness: i64,
    pub avg_cpu_freq: i64,
    pub gpu_load: f64,
    pub wifi_kbps: i64,
    pub cell_kbps: i64,
}

impl TelemetryRow {
    pub fn from_deltas(deltas: &Deltas, timestamp: f64) -> Self {
        let f = &deltas.features;
        Self {
            timestamp: timestamp as i64,
            current_ma: deltas.current_ma,
            brightness: f.brightness as i64,
            avg_cpu_freq: f.avg_cpu_freq as i64,
            gpu_load: (f.gpu_load_pct * 10.0).round() / 10.0,
            wifi_kbps: f.wifi_kbps as i64,
            cell_kbps: f.cell_kbps as i64,
        }
    }

    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{:.1},{},{}",
            self.timestamp,
            self.current_ma,
            self.brightness,
            self.avg_cpu_freq,
            self.gpu_load,
            self.wifi_kbps,
            self.cell_kbps
        )
    }
}

pub struct TelemetryLog {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl TelemetryLog {
    /// Open `path` for appending, creating it (and its header) if needed.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if needs_header {
            writeln!(writer, "{CSV_HEADER}")?;
            writer.flush()?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn append(&mut self, row: &TelemetryRow) -> std::io::Result<()> {
        writeln!(self.writer, "{}", row.to_csv())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}
