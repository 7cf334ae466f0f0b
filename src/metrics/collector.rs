//! Metrics collection and registry.

use crate::pipeline::PipelineStats;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Frames fully processed.
    pub frames_processed: u64,
    /// Frames with a triggered motion verdict.
    pub motion_frames: u64,
    /// Tamper events emitted.
    pub tamper_events: u64,
    /// Object events emitted.
    pub object_events: u64,
    /// Recording sessions closed with a motion event.
    pub sessions_completed: u64,
    /// Whether a clip is currently open.
    pub recording_active: bool,
    /// Background reference replacements.
    pub background_refreshes: u64,
    /// Event store write failures.
    pub persistence_failures: u64,
    /// Alert delivery failures.
    pub alert_failures: u64,
    /// Classifier failures.
    pub classifier_failures: u64,
    /// Clip I/O failures.
    pub recording_failures: u64,
}

impl From<&PipelineStats> for MetricsSnapshot {
    fn from(stats: &PipelineStats) -> Self {
        Self {
            frames_processed: stats.frames_processed,
            motion_frames: stats.motion_frames,
            tamper_events: stats.tamper_events,
            object_events: stats.object_events,
            sessions_completed: stats.sessions_completed,
            recording_active: stats.recording_active,
            background_refreshes: stats.background_refreshes,
            persistence_failures: stats.persistence_failures,
            alert_failures: stats.alert_failures,
            classifier_failures: stats.classifier_failures,
            recording_failures: stats.recording_failures,
        }
    }
}

/// Prometheus metrics registry for the surveillance pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    frames_processed: IntCounter,
    motion_frames: IntCounter,
    tamper_events: IntCounter,
    object_events: IntCounter,
    sessions_completed: IntCounter,
    recording_active: IntGauge,
    background_refreshes: IntCounter,

    persistence_failures: IntCounter,
    alert_failures: IntCounter,
    classifier_failures: IntCounter,
    recording_failures: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let metric = IntCounter::new(name, help)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

/// Raises a monotonic counter to `target`.
fn advance(metric: &IntCounter, target: u64) {
    let current = metric.get();
    if target > current {
        metric.inc_by(target - current);
    }
}

impl MetricsRegistry {
    /// Creates a new registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_processed = counter(
            &registry,
            "sentinel_frames_processed_total",
            "Frames fully processed by the pipeline",
        )?;
        let motion_frames = counter(
            &registry,
            "sentinel_motion_frames_total",
            "Frames with a triggered motion verdict",
        )?;
        let tamper_events = counter(
            &registry,
            "sentinel_tamper_events_total",
            "Tamper events emitted",
        )?;
        let object_events = counter(
            &registry,
            "sentinel_object_events_total",
            "Object events emitted",
        )?;
        let sessions_completed = counter(
            &registry,
            "sentinel_recording_sessions_total",
            "Recording sessions closed with a motion event",
        )?;
        let background_refreshes = counter(
            &registry,
            "sentinel_background_refreshes_total",
            "Background reference replacements",
        )?;
        let persistence_failures = counter(
            &registry,
            "sentinel_persistence_failures_total",
            "Event store writes that failed",
        )?;
        let alert_failures = counter(
            &registry,
            "sentinel_alert_failures_total",
            "Alert deliveries that failed",
        )?;
        let classifier_failures = counter(
            &registry,
            "sentinel_classifier_failures_total",
            "Object classifier invocations that failed",
        )?;
        let recording_failures = counter(
            &registry,
            "sentinel_recording_failures_total",
            "Clip open/write/close failures",
        )?;

        let recording_active = IntGauge::new(
            "sentinel_recording_active",
            "Whether a clip is being recorded (1=recording, 0=idle)",
        )?;
        registry.register(Box::new(recording_active.clone()))?;

        Ok(Self {
            registry,
            frames_processed,
            motion_frames,
            tamper_events,
            object_events,
            sessions_completed,
            recording_active,
            background_refreshes,
            persistence_failures,
            alert_failures,
            classifier_failures,
            recording_failures,
        })
    }

    /// Updates all metrics from a snapshot of pipeline state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.frames_processed, snapshot.frames_processed);
        advance(&self.motion_frames, snapshot.motion_frames);
        advance(&self.tamper_events, snapshot.tamper_events);
        advance(&self.object_events, snapshot.object_events);
        advance(&self.sessions_completed, snapshot.sessions_completed);
        advance(&self.background_refreshes, snapshot.background_refreshes);

        advance(&self.persistence_failures, snapshot.persistence_failures);
        advance(&self.alert_failures, snapshot.alert_failures);
        advance(&self.classifier_failures, snapshot.classifier_failures);
        advance(&self.recording_failures, snapshot.recording_failures);

        self.recording_active
            .set(if snapshot.recording_active { 1 } else { 0 });
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            frames_processed: 120,
            motion_frames: 14,
            tamper_events: 1,
            sessions_completed: 2,
            recording_active: true,
            ..MetricsSnapshot::default()
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("sentinel_frames_processed_total 120"));
        assert!(output.contains("sentinel_recording_sessions_total 2"));
        assert!(output.contains("sentinel_recording_active 1"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();

        registry.update(&MetricsSnapshot {
            frames_processed: 50,
            ..MetricsSnapshot::default()
        });
        registry.update(&MetricsSnapshot {
            frames_processed: 10,
            ..MetricsSnapshot::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("sentinel_frames_processed_total 50"));
    }
}
