//! Prometheus metrics exporter for the surveillance pipeline.
//!
//! # Metrics Exposed
//!
//! - `sentinel_frames_processed_total` - Frames fully processed
//! - `sentinel_motion_frames_total` - Frames with triggered motion
//! - `sentinel_tamper_events_total` - Tamper events emitted
//! - `sentinel_object_events_total` - Object events emitted
//! - `sentinel_recording_sessions_total` - Completed recording sessions
//! - `sentinel_recording_active` - 1 while a clip is open
//! - `sentinel_background_refreshes_total` - Background reference replacements
//! - `sentinel_{persistence,alert,classifier,recording}_failures_total` -
//!   Non-fatal failures by collaborator
//!
//! The HTTP exporter (`/metrics`, `/health`) requires the `metrics` feature.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
