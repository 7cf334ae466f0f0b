//! Configuration file format.

use crate::alerts::AlertsConfig;
use crate::capture::{CaptureConfig, ConfigError};
use crate::detection::{MotionConfig, ObjectConfig, TamperConfig};
use crate::pipeline::{OutputConfig, PipelineSettings};
use crate::recording::RecordingConfig;
use crate::retention::RetentionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub tamper: TamperConfig,
    #[serde(default)]
    pub object: ObjectConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Event store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("events.db"),
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.pipeline_settings().validate()?;
        self.alerts.validate()?;
        self.retention.validate()?;
        self.output.validate()?;
        Ok(())
    }

    /// Detector and recorder settings for the pipeline.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            motion: self.motion.clone(),
            tamper: self.tamper.clone(),
            object: self.object.clone(),
            recording: self.recording.clone(),
            parallel_detectors: self.output.parallel_detectors,
        }
    }
}
