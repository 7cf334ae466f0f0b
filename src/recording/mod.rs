//! Alarm-driven clip recording.

mod clip;
mod controller;

pub use clip::{ClipFactory, ClipWriter, MjpegClipFactory, MjpegClipWriter};
pub use controller::{RecordingController, RecordingState, RecordingTransition};

use crate::capture::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Clip I/O errors. Any of these abandons the current session.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("failed to open clip {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write clip {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error("frame geometry changed from {expected:?} to {actual:?}")]
    Geometry {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Recording configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory receiving clips.
    pub directory: PathBuf,
    /// File name prefix of clips.
    pub clip_prefix: String,
    /// Nominal playback rate of clips.
    pub fps: u32,
    /// JPEG quality of clip frames (1-100).
    pub jpeg_quality: u8,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("recordings"),
            clip_prefix: "clip".into(),
            fps: 20,
            jpeg_quality: 80,
        }
    }
}

impl RecordingConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                field: "recording.jpeg_quality",
                reason: "must be within 1-100".into(),
            });
        }
        Ok(())
    }

    /// Factory matching this configuration.
    pub fn clip_factory(&self) -> MjpegClipFactory {
        MjpegClipFactory::new(self.jpeg_quality)
    }
}
