//! Sentinel Cam Library
//!
//! A single-camera surveillance agent. Every captured frame is checked
//! for motion against an adaptive background, for lens tampering, and for
//! objects reported by an external classifier. Alarm conditions drive clip
//! recording and produce de-duplicated detection events.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → detection → events/alerts → recording → output
//!                ↓                          ↓
//!             metrics                   retention (out-of-band)
//! ```
//!
//! # Design Principles
//!
//! - **Edge-triggered events**: a tamper or object condition produces one
//!   event per contiguous run, at its first frame
//! - **Sessions, not frames**: motion is logged once per recording session,
//!   when the clip closes
//! - **Non-fatal collaborators**: store, alert, classifier and clip failures
//!   are logged and the pipeline continues
//! - **Scoped release**: the camera and any open clip are closed on every
//!   exit path
//!
//! # Example
//!
//! ```no_run
//! use sentinel_cam::{
//!     alerts::MemoryAlertSink,
//!     capture::{CameraGuard, CaptureConfig, MockCamera},
//!     detection::NullClassifier,
//!     events::MemoryEventStore,
//!     pipeline::{self, Collaborators, FramePipeline, NullFrameSink, PipelineSettings},
//!     recording::MjpegClipFactory,
//! };
//! use std::sync::atomic::AtomicBool;
//!
//! let mut camera = CameraGuard::open(MockCamera::new(), &CaptureConfig::default()).unwrap();
//!
//! let mut sentinel = FramePipeline::new(
//!     PipelineSettings::default(),
//!     Collaborators {
//!         classifier: Box::new(NullClassifier),
//!         store: Box::new(MemoryEventStore::new()),
//!         alerts: Box::new(MemoryAlertSink::default()),
//!         clips: Box::new(MjpegClipFactory::default()),
//!         output: Box::new(NullFrameSink),
//!     },
//! );
//!
//! let stop = AtomicBool::new(false);
//! let summary = pipeline::run(&mut *camera, &mut sentinel, &stop, Some(600)).unwrap();
//! println!("{} recording sessions", summary.stats.sessions_completed);
//!
//! for event in sentinel.store().list_all().unwrap() {
//!     println!("{}", event);
//! }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod alerts;
pub mod capture;
pub mod config;
pub mod detection;
pub mod events;
pub mod metrics;
pub mod pipeline;
pub mod recording;
pub mod retention;

// Re-export commonly used types at crate root
pub use capture::{Camera, CameraGuard, CaptureConfig, Frame, MockCamera};
pub use config::FileConfig;
pub use detection::{MotionDetector, ObjectAdapter, TamperDetector};
pub use events::{DetectionEvent, EventDeduplicator, EventStore, EventType, SqliteEventStore};
pub use pipeline::{FramePipeline, FrameReport, PipelineStats};
pub use recording::RecordingController;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
