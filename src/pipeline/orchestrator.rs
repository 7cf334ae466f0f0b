//! The frame pipeline.

use super::{Collaborators, FrameSink, PipelineSettings};
use crate::alerts::AlertSink;
use crate::capture::Frame;
use crate::detection::{
    annotate, MotionDetector, MotionVerdict, ObjectAdapter, ObjectClassifier, ObjectOutcome,
    TamperDetector, TamperVerdict,
};
use crate::events::{DetectionEvent, EventDeduplicator, EventStore};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::recording::{RecordingController, RecordingTransition};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Running totals of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub motion_frames: u64,
    pub tamper_events: u64,
    pub object_events: u64,
    pub sessions_completed: u64,
    pub recording_active: bool,
    pub background_refreshes: u64,
    pub persistence_failures: u64,
    pub alert_failures: u64,
    pub classifier_failures: u64,
    pub recording_failures: u64,
}

/// What happened to one frame.
#[derive(Debug)]
pub struct FrameReport {
    pub sequence: u64,
    /// `None` while the background was being initialised.
    pub motion: Option<MotionVerdict>,
    pub tamper: TamperVerdict,
    pub object: ObjectOutcome,
    /// Combined alarm seen by the recorder.
    pub alarm: bool,
    /// Events emitted for this frame, in emission order.
    pub events: Vec<DetectionEvent>,
    pub recording: RecordingTransition,
}

impl FrameReport {
    pub fn motion_triggered(&self) -> bool {
        self.motion.map(|v| v.triggered).unwrap_or(false)
    }
}

/// Owns all per-stream state and drives the collaborators.
///
/// The background reference, the de-duplication flags, and the open clip
/// are owned here and only mutated from the calling thread.
pub struct FramePipeline {
    motion: MotionDetector,
    tamper: TamperDetector,
    object: ObjectAdapter<Box<dyn ObjectClassifier>>,
    tamper_dedup: EventDeduplicator,
    object_dedup: EventDeduplicator,
    recorder: RecordingController,
    store: Box<dyn EventStore>,
    alerts: Box<dyn AlertSink>,
    output: Box<dyn FrameSink>,
    parallel: bool,
    stats: PipelineStats,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl FramePipeline {
    pub fn new(settings: PipelineSettings, collaborators: Collaborators) -> Self {
        let Collaborators {
            classifier,
            store,
            alerts,
            clips,
            output,
        } = collaborators;

        Self {
            motion: MotionDetector::new(settings.motion),
            tamper: TamperDetector::new(settings.tamper),
            object: ObjectAdapter::new(classifier, settings.object),
            tamper_dedup: EventDeduplicator::new(),
            object_dedup: EventDeduplicator::new(),
            recorder: RecordingController::new(settings.recording, clips),
            store,
            alerts,
            output,
            parallel: settings.parallel_detectors,
            stats: PipelineStats::default(),
            metrics: None,
        }
    }

    /// Publishes stats to `registry` after every frame.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Processes one frame end to end.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        let (motion, tamper, object) = self.evaluate(frame);
        let timestamp = frame.captured_at().naive_local();
        let mut events = Vec::new();

        if object.classifier_failed {
            self.stats.classifier_failures += 1;
        }

        if self.tamper_dedup.on_verdict(tamper.triggered) {
            info!(frame = frame.sequence(), mean = tamper.metadata, "Tamper detected");
            self.stats.tamper_events += 1;
            events.push(self.emit(DetectionEvent::tamper(timestamp)));
        }

        if self.object_dedup.on_verdict(object.verdict.triggered) {
            info!(
                frame = frame.sequence(),
                label = object.label.as_deref().unwrap_or("?"),
                confidence = object.verdict.metadata,
                "Object detected"
            );
            self.stats.object_events += 1;
            events.push(self.emit(DetectionEvent::object(timestamp, object.verdict.metadata)));
        }

        let mut annotated = object.annotated.clone();
        if tamper.triggered {
            annotate::draw_tamper_warning(&mut annotated);
        }

        let motion_triggered = motion.map(|v| v.triggered).unwrap_or(false);
        let alarm = motion_triggered || tamper.triggered || object.verdict.triggered;

        let recording = self.recorder.step(alarm, frame, &annotated);
        match &recording {
            RecordingTransition::Stopped { event, .. } => {
                self.persist(event);
                events.push(event.clone());
            }
            RecordingTransition::Failed { .. } => self.stats.recording_failures += 1,
            _ => {}
        }

        self.output.present(frame.sequence(), &annotated);

        if motion_triggered {
            self.stats.motion_frames += 1;
        }
        self.stats.frames_processed += 1;
        self.stats.sessions_completed = self.recorder.sessions_completed();
        self.stats.recording_active = self.recorder.is_recording();
        self.stats.background_refreshes = self.motion.background().refresh_count();
        self.publish();

        FrameReport {
            sequence: frame.sequence(),
            motion,
            tamper,
            object,
            alarm,
            events,
            recording,
        }
    }

    /// Runs the three detectors and joins their verdicts.
    fn evaluate(&mut self, frame: &Frame) -> (Option<MotionVerdict>, TamperVerdict, ObjectOutcome) {
        if !self.parallel {
            let motion = self.motion.process(frame);
            let tamper = self.tamper.detect(frame);
            let object = self.object.classify(frame);
            return (motion, tamper, object);
        }

        let motion_detector = &mut self.motion;
        let tamper_detector = &self.tamper;
        let object_adapter = &mut self.object;

        std::thread::scope(|scope| {
            let worker = scope.spawn(move || motion_detector.process(frame));
            let tamper = tamper_detector.detect(frame);
            let object = object_adapter.classify(frame);
            let motion = match worker.join() {
                Ok(motion) => motion,
                Err(_) => {
                    error!(frame = frame.sequence(), "Motion worker panicked");
                    None
                }
            };
            (motion, tamper, object)
        })
    }

    /// Persists an alarm event and forwards it to the alert sink.
    fn emit(&mut self, event: DetectionEvent) -> DetectionEvent {
        self.persist(&event);
        if let Err(e) = self.alerts.notify(event.event_type, event.confidence) {
            warn!(event_type = %event.event_type, "Alert delivery failed: {}", e);
            self.stats.alert_failures += 1;
        }
        event
    }

    fn persist(&mut self, event: &DetectionEvent) {
        match self.store.append(event) {
            Ok(()) => debug!(event = %event, "Event stored"),
            Err(e) => {
                warn!(event = %event, "Dropping event, store write failed: {}", e);
                self.stats.persistence_failures += 1;
            }
        }
    }

    fn publish(&self) {
        if let Some(registry) = &self.metrics {
            registry.update(&MetricsSnapshot::from(&self.stats));
        }
    }

    /// Closes any open clip. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> Option<PathBuf> {
        let closed = self.recorder.shutdown();
        self.stats.recording_active = false;
        self.publish();
        closed
    }

    /// Running totals.
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// The event store.
    pub fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    /// Returns true while a clip is open.
    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Path chosen by the most recent recording session.
    pub fn last_clip_path(&self) -> Option<&std::path::Path> {
        self.recorder.last_clip_path()
    }
}
