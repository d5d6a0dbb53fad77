//! Shared control-intent document.
//!
//! The selection file is the rendezvous point between every writer of
//! actuation intent: the local dashboard, the phone app via `POST /control`,
//! and the session-start loader. There is deliberately no lock and no
//! versioning — writers are infrequent, human-paced events, and the contract
//! is simply that the most recent successful write wins. What we do
//! guarantee is that a reader never observes a half-written document: every
//! write goes to a temp file and is renamed into place.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::utils::write_atomic;

/// Default LED brightness on the 0–100 scale.
pub const DEFAULT_BRIGHTNESS: i64 = 65;

/// The five ambient light presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientMode {
    Love,
    Relaxed,
    Fresh,
    Sleepy,
    Natural,
}

impl AmbientMode {
    /// Resolve a user-facing mode name, case-insensitively. Unknown names
    /// resolve to `None` and are treated as "no mode selected".
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "love" => Some(Self::Love),
            "relaxed" => Some(Self::Relaxed),
            "fresh" => Some(Self::Fresh),
            "sleepy" => Some(Self::Sleepy),
            "natural" => Some(Self::Natural),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Love => "Love",
            Self::Relaxed => "Relaxed",
            Self::Fresh => "Fresh",
            Self::Sleepy => "Sleepy",
            Self::Natural => "Natural",
        }
    }

    /// Full-brightness RGB for this preset.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Love => (255, 105, 180),
            Self::Relaxed => (50, 205, 50),
            Self::Fresh => (0, 191, 255),
            Self::Sleepy => (255, 215, 0),
            Self::Natural => (255, 255, 255),
        }
    }
}

/// Last-known desired actuation state, as persisted in the selection file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlIntent {
    pub light_on: bool,
    pub light_mode: Option<String>,
    pub brightness: i64,
    pub audio_on: bool,
    pub audio_mode: Option<String>,
}

impl Default for ControlIntent {
    fn default() -> Self {
        Self {
            light_on: false,
            light_mode: None,
            brightness: DEFAULT_BRIGHTNESS,
            audio_on: false,
            audio_mode: None,
        }
    }
}

impl ControlIntent {
    /// The resolved ambient mode, if the stored name is one of the five
    /// known presets.
    pub fn ambient_mode(&self) -> Option<AmbientMode> {
        self.light_mode.as_deref().and_then(AmbientMode::from_name)
    }

    fn clamp(mut self) -> Self {
        self.brightness = self.brightness.clamp(0, 100);
        self
    }
}

/// Partial update to the intent document. Absent fields leave the stored
/// value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPatch {
    pub light_on: Option<bool>,
    pub light_mode: Option<String>,
    pub brightness: Option<i64>,
    pub audio_on: Option<bool>,
    pub audio_mode: Option<String>,
}

impl ControlPatch {
    fn apply(self, mut intent: ControlIntent) -> ControlIntent {
        if let Some(light_on) = self.light_on {
            intent.light_on = light_on;
        }
        if let Some(light_mode) = self.light_mode {
            intent.light_mode = Some(light_mode);
        }
        if let Some(brightness) = self.brightness {
            intent.brightness = brightness;
        }
        if let Some(audio_on) = self.audio_on {
            intent.audio_on = audio_on;
        }
        if let Some(audio_mode) = self.audio_mode {
            intent.audio_mode = Some(audio_mode);
        }
        intent
    }
}

/// File-backed intent channel. Cloneable; every clone points at the same
/// document.
#[derive(Clone)]
pub struct ControlChannel {
    path: PathBuf,
}

impl ControlChannel {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Current intent, or the disabled default when the document is absent
    /// or malformed. Never fails: a reader must tolerate another writer
    /// having just replaced (or deleted) the file.
    pub fn read_intent(&self) -> ControlIntent {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!("no control document at {}: {err}", self.path.display());
                return ControlIntent::default();
            }
        };
        match serde_json::from_str::<ControlIntent>(&contents) {
            Ok(intent) => intent.clamp(),
            Err(err) => {
                warn!(
                    "malformed control document {}, treating as unset: {err}",
                    self.path.display()
                );
                ControlIntent::default()
            }
        }
    }

    /// Merge `patch` into the persisted document and atomically replace it.
    /// Brightness is clamped to [0, 100] before persisting. Returns the
    /// merged intent.
    pub fn write_intent(&self, patch: ControlPatch) -> Result<ControlIntent> {
        let merged = patch.apply(self.read_intent()).clamp();
        let serialized = serde_json::to_string_pretty(&merged)?;
        write_atomic(&self.path, &serialized)?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn channel() -> (ControlChannel, PathBuf) {
        let dir = std::env::temp_dir().join(format!("sleepdoc-control-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        (ControlChannel::new(dir.join("vsd_selection.json")), dir)
    }

    #[test]
    fn missing_document_reads_as_default() {
        let (channel, dir) = channel();
        assert_eq!(channel.read_intent(), ControlIntent::default());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn roundtrip_preserves_the_record() {
        let (channel, dir) = channel();
        let written = channel
            .write_intent(ControlPatch {
                light_on: Some(true),
                light_mode: Some("Fresh".into()),
                brightness: Some(80),
                audio_on: Some(true),
                audio_mode: Some("rain".into()),
            })
            .unwrap();
        assert_eq!(channel.read_intent(), written);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn partial_patch_keeps_other_fields() {
        let (channel, dir) = channel();
        channel
            .write_intent(ControlPatch {
                light_on: Some(true),
                light_mode: Some("sleepy".into()),
                brightness: Some(40),
                ..ControlPatch::default()
            })
            .unwrap();
        let merged = channel
            .write_intent(ControlPatch {
                brightness: Some(90),
                ..ControlPatch::default()
            })
            .unwrap();
        assert!(merged.light_on);
        assert_eq!(merged.light_mode.as_deref(), Some("sleepy"));
        assert_eq!(merged.brightness, 90);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn brightness_clamped_to_bounds() {
        let (channel, dir) = channel();
        let merged = channel
            .write_intent(ControlPatch {
                brightness: Some(250),
                ..ControlPatch::default()
            })
            .unwrap();
        assert_eq!(merged.brightness, 100);
        let merged = channel
            .write_intent(ControlPatch {
                brightness: Some(-5),
                ..ControlPatch::default()
            })
            .unwrap();
        assert_eq!(merged.brightness, 0);
        // The persisted document is clamped too, not just the return value.
        assert_eq!(channel.read_intent().brightness, 0);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn out_of_range_brightness_in_foreign_document_clamped_on_read() {
        let (channel, dir) = channel();
        fs::write(
            dir.join("vsd_selection.json"),
            r#"{"light_on": true, "light_mode": "natural", "brightness": 255,
                "audio_on": false, "audio_mode": null}"#,
        )
        .unwrap();
        assert_eq!(channel.read_intent().brightness, 100);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn malformed_document_reads_as_default() {
        let (channel, dir) = channel();
        fs::write(dir.join("vsd_selection.json"), "{not json").unwrap();
        assert_eq!(channel.read_intent(), ControlIntent::default());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn deleted_between_write_and_read_reads_as_default() {
        let (channel, dir) = channel();
        channel
            .write_intent(ControlPatch {
                light_on: Some(true),
                ..ControlPatch::default()
            })
            .unwrap();
        fs::remove_file(dir.join("vsd_selection.json")).unwrap();
        assert_eq!(channel.read_intent(), ControlIntent::default());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn idempotent_writes_produce_identical_documents() {
        let (channel, dir) = channel();
        let patch = ControlPatch {
            light_on: Some(true),
            light_mode: Some("love".into()),
            brightness: Some(55),
            ..ControlPatch::default()
        };
        let first = channel.write_intent(patch.clone()).unwrap();
        let first_doc = fs::read_to_string(dir.join("vsd_selection.json")).unwrap();
        let second = channel.write_intent(patch).unwrap();
        let second_doc = fs::read_to_string(dir.join("vsd_selection.json")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first_doc, second_doc);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn last_writer_wins() {
        let (channel, dir) = channel();
        channel
            .write_intent(ControlPatch {
                light_on: Some(true),
                light_mode: Some("Fresh".into()),
                ..ControlPatch::default()
            })
            .unwrap();
        channel
            .write_intent(ControlPatch {
                light_mode: Some("Sleepy".into()),
                ..ControlPatch::default()
            })
            .unwrap();
        assert_eq!(channel.read_intent().ambient_mode(), Some(AmbientMode::Sleepy));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn mode_names_resolve_case_insensitively() {
        assert_eq!(AmbientMode::from_name("FRESH"), Some(AmbientMode::Fresh));
        assert_eq!(AmbientMode::from_name("  love "), Some(AmbientMode::Love));
        assert_eq!(AmbientMode::from_name("disco"), None);
        assert_eq!(AmbientMode::from_name(""), None);
    }

    #[test]
    fn unknown_mode_reads_as_no_mode() {
        let intent = ControlIntent {
            light_on: true,
            light_mode: Some("disco".into()),
            ..ControlIntent::default()
        };
        assert_eq!(intent.ambient_mode(), None);
    }
}
