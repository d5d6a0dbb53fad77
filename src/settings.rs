use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{fs, time::Duration};

/// Runtime settings for the daemon, loaded once at boot.
///
/// All paths double as the cross-process rendezvous points shared with the
/// dashboard GUI and the phone app, so changing them here changes them for
/// every collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory that receives one `vitals_<start-time>.csv` per session
    /// plus the rolling `data_live.csv`.
    pub data_dir: PathBuf,
    /// Single-line live readout, overwritten every acquisition cycle.
    pub live_vitals_path: PathBuf,
    /// Shared control-intent document (light/audio selection).
    pub selection_path: PathBuf,
    /// Presence-only sentinel; its existence stops the running session.
    pub stop_marker_path: PathBuf,
    /// Serial device of the radar data port (`hardware` feature).
    pub radar_device: String,
    /// HTTP bind address for the vitals/control API.
    pub api_addr: SocketAddr,
    /// Seconds between sensor polls while a session is running.
    pub acquire_interval_secs: u64,
    /// Seconds between actuation passes over the control intent.
    pub actuate_interval_secs: u64,
    /// Seconds between environmental sensor polls.
    pub env_interval_secs: u64,
    /// Start a monitoring session immediately at boot instead of waiting
    /// for a gesture.
    pub autostart: bool,
    pub telegram: Option<TelegramSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data_collected"),
            live_vitals_path: PathBuf::from("/tmp/live_vitals.txt"),
            selection_path: PathBuf::from("/tmp/vsd_selection.json"),
            stop_marker_path: PathBuf::from("/tmp/stop_vitals"),
            radar_device: "/dev/ttyUSB0".to_string(),
            api_addr: "0.0.0.0:5000".parse().expect("static addr"),
            acquire_interval_secs: 2,
            actuate_interval_secs: 1,
            env_interval_secs: 2,
            autostart: false,
            telegram: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults when the
    /// file is missing. A present-but-unreadable file is an error: silently
    /// ignoring a broken config hides misdirected log paths.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn acquire_interval(&self) -> Duration {
        Duration::from_secs(self.acquire_interval_secs.max(1))
    }

    pub fn actuate_interval(&self) -> Duration {
        Duration::from_secs(self.actuate_interval_secs.max(1))
    }

    pub fn env_interval(&self) -> Duration {
        Duration::from_secs(self.env_interval_secs.max(1))
    }
}
