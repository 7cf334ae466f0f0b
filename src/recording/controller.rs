//! Start/stop policy for clip capture.
//!
//! ```text
//!            alarm                          alarm
//!   IDLE ─────────────▶ RECORDING ◀──────────────┐
//!    ▲                    │   └──────────────────┘
//!    └────────────────────┘
//!         no alarm: close clip, emit motion event
//! ```
//!
//! Clip I/O failures abandon the session and return to IDLE without a
//! motion event, so no event ever points at a broken clip.

use super::{ClipFactory, ClipWriter, RecordingConfig, RecordingError};
use crate::capture::Frame;
use crate::events::DetectionEvent;
use chrono::{DateTime, Local};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// What a single step did.
#[derive(Debug)]
pub enum RecordingTransition {
    /// IDLE and no alarm.
    Idle,
    /// A new clip was opened and the current frame written to it.
    Started { path: PathBuf },
    /// The current frame was appended to the open clip.
    Continued,
    /// The clip was closed; the session's motion event.
    Stopped { event: DetectionEvent, frames: u64 },
    /// Clip I/O failed; the session (if any) was abandoned.
    Failed { path: PathBuf, error: RecordingError },
}

/// The open clip of the current session.
struct RecordingSession {
    path: PathBuf,
    writer: Box<dyn ClipWriter>,
}

/// Opens, feeds, and closes clips according to the alarm signal.
///
/// At most one session is open at a time. An open session is flushed
/// when the controller is dropped.
pub struct RecordingController {
    factory: Box<dyn ClipFactory>,
    config: RecordingConfig,
    session: Option<RecordingSession>,
    last_clip_path: Option<PathBuf>,
    sessions_completed: u64,
}

impl RecordingController {
    pub fn new(config: RecordingConfig, factory: Box<dyn ClipFactory>) -> Self {
        Self {
            factory,
            config,
            session: None,
            last_clip_path: None,
            sessions_completed: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> RecordingState {
        if self.session.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    /// Returns true while a clip is open.
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Path chosen by the most recent session start.
    pub fn last_clip_path(&self) -> Option<&Path> {
        self.last_clip_path.as_deref()
    }

    /// Sessions closed with a motion event.
    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed
    }

    /// Path a clip started at `at` would use.
    pub fn clip_path_for(&self, at: DateTime<Local>) -> PathBuf {
        self.config.directory.join(format!(
            "{}_{}.{}",
            self.config.clip_prefix,
            at.format("%Y%m%d_%H%M%S"),
            self.factory.extension()
        ))
    }

    /// Advances the state machine by one frame.
    pub fn step(&mut self, alarm: bool, frame: &Frame, annotated: &RgbImage) -> RecordingTransition {
        match (self.session.is_some(), alarm) {
            (false, false) => RecordingTransition::Idle,
            (false, true) => self.start(frame, annotated),
            (true, true) => self.append(annotated),
            (true, false) => self.stop(frame),
        }
    }

    fn start(&mut self, frame: &Frame, annotated: &RgbImage) -> RecordingTransition {
        let path = self.clip_path_for(frame.captured_at());

        let opened = std::fs::create_dir_all(&self.config.directory)
            .map_err(|source| RecordingError::Open {
                path: self.config.directory.clone(),
                source,
            })
            .and_then(|()| self.factory.open(&path, annotated.width(), annotated.height()));

        let mut writer = match opened {
            Ok(writer) => writer,
            Err(error) => {
                tracing::warn!(path = %path.display(), "Failed to open clip: {}", error);
                return RecordingTransition::Failed { path, error };
            }
        };

        if let Err(error) = writer.write_frame(annotated) {
            tracing::warn!(path = %path.display(), "Failed to write clip: {}", error);
            Self::discard(writer);
            return RecordingTransition::Failed { path, error };
        }

        tracing::info!(path = %path.display(), "Recording started");
        self.last_clip_path = Some(path.clone());
        self.session = Some(RecordingSession {
            path: path.clone(),
            writer,
        });
        RecordingTransition::Started { path }
    }

    fn append(&mut self, annotated: &RgbImage) -> RecordingTransition {
        let Some(session) = self.session.as_mut() else {
            return RecordingTransition::Idle;
        };

        match session.writer.write_frame(annotated) {
            Ok(()) => RecordingTransition::Continued,
            Err(error) => {
                let session = self.session.take();
                let path = session.as_ref().map(|s| s.path.clone()).unwrap_or_default();
                tracing::warn!(path = %path.display(), "Clip write failed, abandoning session: {}", error);
                if let Some(session) = session {
                    Self::discard(session.writer);
                }
                RecordingTransition::Failed { path, error }
            }
        }
    }

    fn stop(&mut self, frame: &Frame) -> RecordingTransition {
        let Some(session) = self.session.take() else {
            return RecordingTransition::Idle;
        };

        let frames = session.writer.frames_written();
        if let Err(error) = session.writer.finish() {
            tracing::warn!(path = %session.path.display(), "Failed to close clip: {}", error);
            return RecordingTransition::Failed {
                path: session.path,
                error,
            };
        }

        tracing::info!(path = %session.path.display(), frames, "Recording stopped");
        self.sessions_completed += 1;
        RecordingTransition::Stopped {
            event: DetectionEvent::motion(frame.captured_at().naive_local(), session.path),
            frames,
        }
    }

    /// Closes any open clip without emitting an event. Returns its path.
    pub fn shutdown(&mut self) -> Option<PathBuf> {
        let session = self.session.take()?;
        match session.writer.finish() {
            Ok(()) => tracing::info!(path = %session.path.display(), "Open clip closed on shutdown"),
            Err(e) => tracing::warn!(path = %session.path.display(), "Failed to close clip on shutdown: {}", e),
        }
        Some(session.path)
    }

    fn discard(writer: Box<dyn ClipWriter>) {
        if let Err(e) = writer.finish() {
            tracing::debug!("Ignoring close error on abandoned clip: {}", e);
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
