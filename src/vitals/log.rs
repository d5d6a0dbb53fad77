use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use super::sample::{VitalsSample, CSV_HEADER};
use crate::utils::write_atomic;

/// Durable per-session logging: one timestamped CSV kept forever plus the
/// rolling `data_live.csv` truncated at every session start.
///
/// The log owns its file handles for the whole Running interval; nothing
/// else opens these files for writing. Dropping the log closes them.
pub struct SessionLog {
    session_file: File,
    rolling_file: File,
    session_path: PathBuf,
}

impl SessionLog {
    /// Open the logs for a session that started at `started_at`. Creates the
    /// data directory if needed, writes the header row to both files.
    pub fn open(data_dir: &Path, rolling_path: &Path, started_at: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let session_path = data_dir.join(format!(
            "vitals_{}.csv",
            started_at.format("%Y-%m-%d_%H-%M-%S")
        ));
        let mut session_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&session_path)
            .with_context(|| format!("failed to open session log {}", session_path.display()))?;
        writeln!(session_file, "{CSV_HEADER}")?;

        let mut rolling_file = File::create(rolling_path)
            .with_context(|| format!("failed to reset rolling log {}", rolling_path.display()))?;
        writeln!(rolling_file, "{CSV_HEADER}")?;

        Ok(Self {
            session_file,
            rolling_file,
            session_path,
        })
    }

    /// Append one sample to both logs and flush so an external reader (or a
    /// crash) sees at most one missing row.
    pub fn append(&mut self, sample: &VitalsSample) -> Result<()> {
        let row = sample.csv_row();
        writeln!(self.session_file, "{row}").context("session log append failed")?;
        self.session_file.flush()?;
        writeln!(self.rolling_file, "{row}").context("rolling log append failed")?;
        self.rolling_file.flush()?;
        Ok(())
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }
}

/// Single-line live readout for consumers that poll a file instead of the
/// HTTP API. Replaced atomically so a reader never sees a partial line.
#[derive(Clone)]
pub struct LiveFile {
    path: PathBuf,
}

impl LiveFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn publish(&self, sample: &VitalsSample) -> Result<()> {
        write_atomic(&self.path, &format!("{}\n", sample.live_line()))
    }
}
