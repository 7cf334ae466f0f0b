//! Per-frame orchestration.
//!
//! Every frame flows through the same fixed sequence:
//!
//! ```text
//! capture ─▶ motion ┐
//!          ─▶ tamper ├─▶ join ─▶ de-dup/emit ─▶ recording ─▶ output
//!          ─▶ object ┘
//! ```
//!
//! One frame is fully processed before the next is acquired, so events
//! are emitted in frame order. Store and alert failures are logged and
//! counted, never propagated; only capture failures end a run.

mod orchestrator;
mod output;
mod runner;

pub use orchestrator::{FramePipeline, FrameReport, PipelineStats};
pub use output::{FrameSink, NullFrameSink, SnapshotSink};
pub use runner::{run, RunSummary, StopReason};

use crate::alerts::AlertSink;
use crate::capture::{CameraError, ConfigError};
use crate::detection::{MotionConfig, ObjectClassifier, ObjectConfig, TamperConfig};
use crate::events::EventStore;
use crate::recording::{ClipFactory, RecordingConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("frame capture failed: {0}")]
    Capture(#[from] CameraError),
}

/// Detector and recorder parameters.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub motion: MotionConfig,
    pub tamper: TamperConfig,
    pub object: ObjectConfig,
    pub recording: RecordingConfig,
    /// Evaluate motion on a worker thread alongside the other detectors.
    pub parallel_detectors: bool,
}

impl PipelineSettings {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.motion.validate()?;
        self.tamper.validate()?;
        self.object.validate()?;
        self.recording.validate()?;
        Ok(())
    }
}

/// External collaborators driven by the pipeline.
pub struct Collaborators {
    pub classifier: Box<dyn ObjectClassifier>,
    pub store: Box<dyn EventStore>,
    pub alerts: Box<dyn AlertSink>,
    pub clips: Box<dyn ClipFactory>,
    pub output: Box<dyn FrameSink>,
}

/// Output and runtime options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Latest annotated frame is written here, if set.
    pub snapshot_path: Option<PathBuf>,
    /// Frames between snapshot writes.
    pub snapshot_every: u64,
    /// Evaluate motion on a worker thread alongside the other detectors.
    pub parallel_detectors: bool,
    /// Port of the Prometheus exporter (`metrics` feature).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            snapshot_every: 20,
            parallel_detectors: true,
            metrics_port: 9090,
        }
    }
}

impl OutputConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_every == 0 {
            return Err(ConfigError::InvalidValue {
                field: "output.snapshot_every",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Builds the frame sink described by this configuration.
    pub fn build_sink(&self) -> Box<dyn FrameSink> {
        match &self.snapshot_path {
            Some(path) => Box::new(SnapshotSink::new(path.clone(), self.snapshot_every)),
            None => Box::new(NullFrameSink),
        }
    }
}
