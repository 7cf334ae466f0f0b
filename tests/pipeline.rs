//! End-to-end pipeline behaviour with scripted collaborators.

use chrono::{DateTime, Local, TimeZone};
use image::{Rgb, RgbImage};
use proptest::prelude::*;
use sentinel_cam::alerts::{AlertError, AlertSink};
use sentinel_cam::capture::{Camera, CameraError, CameraGuard, CaptureConfig, MockCamera};
use sentinel_cam::detection::{BoundingBox, Detection, ScriptedClassifier};
use sentinel_cam::events::{DetectionEvent, EventStore, EventType, MemoryEventStore, StoreError};
use sentinel_cam::pipeline::{
    self, Collaborators, FramePipeline, NullFrameSink, PipelineError, PipelineSettings, StopReason,
};
use sentinel_cam::recording::{MjpegClipFactory, RecordingConfig, RecordingTransition};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::AtomicBool;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scene {
    Static,
    Intruder,
    Dark,
}

fn render(scene: Scene) -> RgbImage {
    match scene {
        Scene::Static => RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([100, 100, 100])),
        Scene::Dark => RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([10, 10, 10])),
        Scene::Intruder => {
            let mut image = render(Scene::Static);
            for y in 20..100 {
                for x in 40..120 {
                    image.put_pixel(x, y, Rgb([250, 250, 250]));
                }
            }
            image
        }
    }
}

fn epoch() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn camera(scenes: &[Scene]) -> CameraGuard<MockCamera> {
    let mock = MockCamera::scripted(scenes.iter().map(|s| render(*s))).with_epoch(epoch());
    CameraGuard::open(mock, &CaptureConfig::with_dimensions(WIDTH, HEIGHT)).unwrap()
}

#[derive(Clone, Default)]
struct SharedAlerts(Rc<RefCell<Vec<(EventType, Option<f32>)>>>);

impl AlertSink for SharedAlerts {
    fn notify(&mut self, event_type: EventType, confidence: Option<f32>) -> Result<(), AlertError> {
        self.0.borrow_mut().push((event_type, confidence));
        Ok(())
    }
}

struct FailingAlerts;

impl AlertSink for FailingAlerts {
    fn notify(&mut self, _: EventType, _: Option<f32>) -> Result<(), AlertError> {
        Err(AlertError::Delivery("smtp down".into()))
    }
}

struct FailingStore;

impl EventStore for FailingStore {
    fn append(&mut self, _: &DetectionEvent) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    fn list_all(&self) -> Result<Vec<DetectionEvent>, StoreError> {
        Ok(Vec::new())
    }
}

struct Harness {
    pipeline: FramePipeline,
    alerts: SharedAlerts,
    recordings: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(classifier: ScriptedClassifier) -> Self {
        Self::build(classifier, Box::new(MemoryEventStore::new()), true)
    }

    fn build(classifier: ScriptedClassifier, store: Box<dyn EventStore>, parallel: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let recordings = dir.path().join("recordings");
        let alerts = SharedAlerts::default();

        let settings = PipelineSettings {
            recording: RecordingConfig {
                directory: recordings.clone(),
                ..RecordingConfig::default()
            },
            parallel_detectors: parallel,
            ..PipelineSettings::default()
        };
        let pipeline = FramePipeline::new(
            settings,
            Collaborators {
                classifier: Box::new(classifier),
                store,
                alerts: Box::new(alerts.clone()),
                clips: Box::new(MjpegClipFactory::default()),
                output: Box::new(NullFrameSink),
            },
        );

        Self {
            pipeline,
            alerts,
            recordings,
            _dir: dir,
        }
    }

    /// Runs until the script is exhausted.
    fn run(&mut self, scenes: &[Scene]) {
        let mut camera = camera(scenes);
        let stop = AtomicBool::new(false);
        let result = pipeline::run(&mut *camera, &mut self.pipeline, &stop, None);
        assert!(matches!(
            result,
            Err(PipelineError::Capture(CameraError::Exhausted))
        ));
    }

    /// Stored events, oldest first.
    fn events(&self) -> Vec<DetectionEvent> {
        let mut events = self.pipeline.store().list_all().unwrap();
        events.reverse();
        events
    }

    fn events_of(&self, event_type: EventType) -> Vec<DetectionEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

fn det(confidence: f32) -> Detection {
    Detection::new("person", confidence, BoundingBox::new(10, 10, 30, 60))
}

/// Scenes numbered from frame 1; `alarm` frames show the intruder.
fn scenes_with_alarm(len: u64, alarm: std::ops::RangeInclusive<u64>) -> Vec<Scene> {
    (1..=len)
        .map(|n| {
            if alarm.contains(&n) {
                Scene::Intruder
            } else {
                Scene::Static
            }
        })
        .collect()
}

#[test]
fn test_first_frame_initialises_background() {
    let mut harness = Harness::new(ScriptedClassifier::default());
    let mut camera = camera(&[Scene::Intruder, Scene::Intruder]);

    let first = harness.pipeline.process_frame(&camera.capture().unwrap());
    assert!(first.motion.is_none());
    assert!(!first.alarm);
    assert!(matches!(first.recording, RecordingTransition::Idle));

    // Same content as the reference: no motion.
    let second = harness.pipeline.process_frame(&camera.capture().unwrap());
    assert!(!second.motion.unwrap().triggered);
}

#[test]
fn test_alarm_run_records_one_session() {
    let mut harness = Harness::new(ScriptedClassifier::default());
    harness.run(&scenes_with_alarm(20, 10..=14));

    let motion = harness.events_of(EventType::Motion);
    assert_eq!(motion.len(), 1);
    assert_eq!(harness.pipeline.stats().sessions_completed, 1);
    assert_eq!(harness.pipeline.stats().motion_frames, 5);

    // Clip named after frame 10 (450 ms after the epoch), event stamped at frame 15.
    let clip = harness.recordings.join("clip_20240301_120000.mjpeg");
    assert_eq!(motion[0].clip_path.as_deref(), Some(clip.as_path()));
    assert_eq!(motion[0].timestamp_text(), "2024-03-01 12:00:00");
    assert_eq!(motion[0].confidence, None);
    assert!(clip.exists());
    assert_eq!(count_jpegs(&clip), 5);

    // Motion events are not alerted.
    assert!(harness.alerts.0.borrow().is_empty());
}

#[test]
fn test_recording_transitions_per_frame() {
    let mut harness = Harness::new(ScriptedClassifier::default());
    let mut camera = camera(&scenes_with_alarm(16, 10..=14));

    for n in 1..=16u64 {
        let report = harness.pipeline.process_frame(&camera.capture().unwrap());
        assert_eq!(report.sequence, n);
        match n {
            10 => assert!(matches!(report.recording, RecordingTransition::Started { .. })),
            11..=14 => assert!(matches!(report.recording, RecordingTransition::Continued)),
            15 => {
                assert!(matches!(report.recording, RecordingTransition::Stopped { frames: 5, .. }));
                assert_eq!(report.events.len(), 1);
            }
            _ => assert!(matches!(report.recording, RecordingTransition::Idle)),
        }
    }
}

#[test]
fn test_tamper_emits_once_per_run() {
    use Scene::*;
    let scenes = [
        Static, Static, Static, Dark, Dark, Dark, Dark, Dark, Static, Static, Dark, Dark, Static,
    ];

    let mut harness = Harness::new(ScriptedClassifier::default());
    harness.run(&scenes);

    let tamper = harness.events_of(EventType::Tamper);
    assert_eq!(tamper.len(), 2);
    assert!(tamper.iter().all(|e| e.confidence.is_none() && e.clip_path.is_none()));
    assert_eq!(harness.pipeline.stats().tamper_events, 2);

    let alerts = harness.alerts.0.borrow();
    assert_eq!(
        *alerts,
        vec![(EventType::Tamper, None), (EventType::Tamper, None)]
    );

    // Each dark run also held the alarm and produced one session.
    assert_eq!(harness.events_of(EventType::Motion).len(), 2);
}

#[test]
fn test_tamper_report_fields() {
    let mut harness = Harness::new(ScriptedClassifier::default());
    let mut camera = camera(&[Scene::Static, Scene::Dark]);

    harness.pipeline.process_frame(&camera.capture().unwrap());
    let report = harness.pipeline.process_frame(&camera.capture().unwrap());

    assert!(report.tamper.triggered);
    assert!(report.tamper.metadata < 20.0);
    assert_eq!(report.events[0].event_type, EventType::Tamper);
    assert!(report.alarm);
}

#[test]
fn test_object_threshold_is_inclusive() {
    let classifier = ScriptedClassifier::new(vec![
        vec![],
        vec![det(0.3)],
        vec![det(0.4), det(0.95)],
        vec![det(0.9)],
        vec![],
        vec![],
    ]);
    let mut harness = Harness::new(classifier);
    harness.run(&[Scene::Static; 6]);

    let objects = harness.events_of(EventType::Object);
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].confidence, Some(0.4));
    assert_eq!(*harness.alerts.0.borrow(), vec![(EventType::Object, Some(0.4))]);

    // Object alarm on frames 3-4 closes a session at frame 5.
    assert_eq!(harness.events_of(EventType::Motion).len(), 1);
}

#[test]
fn test_event_order_matches_frame_order() {
    let classifier = ScriptedClassifier::new(vec![vec![], vec![], vec![], vec![det(0.8)]]);
    let mut harness = Harness::new(classifier);
    harness.run(&[
        Scene::Static,
        Scene::Static,
        Scene::Dark,
        Scene::Dark,
        Scene::Static,
    ]);

    let kinds: Vec<EventType> = harness.events().iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![EventType::Tamper, EventType::Object, EventType::Motion]
    );
}

#[test]
fn test_classifier_failure_is_not_fatal() {
    let mut classifier = ScriptedClassifier::default();
    classifier.push(vec![]);
    classifier.push_failure("model crashed");
    classifier.push(vec![det(0.7)]);

    let mut harness = Harness::new(classifier);
    harness.run(&[Scene::Static; 4]);

    let stats = harness.pipeline.stats();
    assert_eq!(stats.frames_processed, 4);
    assert_eq!(stats.classifier_failures, 1);
    assert_eq!(harness.events_of(EventType::Object).len(), 1);
}

#[test]
fn test_store_failure_is_not_fatal() {
    use Scene::*;
    let mut harness = Harness::build(
        ScriptedClassifier::default(),
        Box::new(FailingStore),
        true,
    );
    harness.run(&[Static, Dark, Dark, Static, Static]);

    let stats = harness.pipeline.stats();
    assert_eq!(stats.frames_processed, 5);
    assert_eq!(stats.tamper_events, 1);
    // Tamper event and the closing motion event were both dropped.
    assert_eq!(stats.persistence_failures, 2);
    // Alerts are still delivered.
    assert_eq!(*harness.alerts.0.borrow(), vec![(EventType::Tamper, None)]);
}

#[test]
fn test_alert_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = FramePipeline::new(
        PipelineSettings {
            recording: RecordingConfig {
                directory: dir.path().to_path_buf(),
                ..RecordingConfig::default()
            },
            ..PipelineSettings::default()
        },
        Collaborators {
            classifier: Box::new(ScriptedClassifier::default()),
            store: Box::new(MemoryEventStore::new()),
            alerts: Box::new(FailingAlerts),
            clips: Box::new(MjpegClipFactory::default()),
            output: Box::new(NullFrameSink),
        },
    );

    let mut camera = camera(&[Scene::Static, Scene::Dark, Scene::Static]);
    let stop = AtomicBool::new(false);
    let _ = pipeline::run(&mut *camera, &mut agent, &stop, None);

    assert_eq!(agent.stats().alert_failures, 1);
    assert_eq!(agent.stats().persistence_failures, 0);
    assert_eq!(agent.store().list_all().unwrap().len(), 2);
}

#[cfg(unix)]
#[test]
fn test_slow_mail_program_does_not_stall_frames() {
    use sentinel_cam::alerts::{EmailAlertSink, EmailConfig};
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    let dir = tempfile::tempdir().unwrap();
    let sendmail = dir.path().join("sendmail");
    std::fs::write(&sendmail, "#!/bin/sh\ncat >/dev/null\nsleep 3\n").unwrap();
    std::fs::set_permissions(&sendmail, std::fs::Permissions::from_mode(0o755)).unwrap();

    let email = EmailAlertSink::new(
        EmailConfig {
            from: "cam@example.org".into(),
            to: vec!["ops@example.org".into()],
            sendmail,
        },
        "Sentinel",
    );
    let mut agent = FramePipeline::new(
        PipelineSettings {
            recording: RecordingConfig {
                directory: dir.path().join("recordings"),
                ..RecordingConfig::default()
            },
            ..PipelineSettings::default()
        },
        Collaborators {
            classifier: Box::new(ScriptedClassifier::default()),
            store: Box::new(MemoryEventStore::new()),
            alerts: Box::new(email),
            clips: Box::new(MjpegClipFactory::default()),
            output: Box::new(NullFrameSink),
        },
    );

    let mut camera = camera(&[Scene::Static, Scene::Dark]);
    agent.process_frame(&camera.capture().unwrap());

    let dark = camera.capture().unwrap();
    let started = Instant::now();
    let report = agent.process_frame(&dark);

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].event_type, EventType::Tamper);
    assert_eq!(agent.stats().alert_failures, 0);
    agent.shutdown();
}

#[test]
fn test_shutdown_flushes_open_clip() {
    let mut harness = Harness::new(ScriptedClassifier::default());
    let scenes = scenes_with_alarm(12, 5..=12);
    let mut camera = camera(&scenes);
    let stop = AtomicBool::new(false);

    let summary = pipeline::run(&mut *camera, &mut harness.pipeline, &stop, Some(8)).unwrap();
    assert_eq!(summary.reason, StopReason::FrameLimit);
    assert_eq!(summary.stats.frames_processed, 8);
    assert!(!summary.stats.recording_active);
    assert!(!harness.pipeline.is_recording());

    let clip = harness.pipeline.last_clip_path().unwrap().to_path_buf();
    assert_eq!(count_jpegs(&clip), 4);
    // No motion event for a session cut short by shutdown.
    assert!(harness.events_of(EventType::Motion).is_empty());
}

#[test]
fn test_stop_flag_ends_run() {
    let mut harness = Harness::new(ScriptedClassifier::default());
    let mut camera = camera(&[Scene::Static; 3]);
    let stop = AtomicBool::new(true);

    let summary = pipeline::run(&mut *camera, &mut harness.pipeline, &stop, None).unwrap();
    assert_eq!(summary.reason, StopReason::Requested);
    assert_eq!(summary.stats.frames_processed, 0);
}

#[test]
fn test_exhausted_source_flushes_clip() {
    let mut harness = Harness::new(ScriptedClassifier::default());
    harness.run(&scenes_with_alarm(6, 3..=6));

    assert!(!harness.pipeline.is_recording());
    let clip = harness.pipeline.last_clip_path().unwrap().to_path_buf();
    assert_eq!(count_jpegs(&clip), 4);
    assert!(harness.events_of(EventType::Motion).is_empty());
}

#[test]
fn test_sequential_and_parallel_agree() {
    let scenes = {
        let mut scenes = scenes_with_alarm(18, 6..=9);
        scenes[12] = Scene::Dark;
        scenes[13] = Scene::Dark;
        scenes
    };

    let mut parallel = Harness::build(ScriptedClassifier::default(), Box::new(MemoryEventStore::new()), true);
    let mut sequential = Harness::build(ScriptedClassifier::default(), Box::new(MemoryEventStore::new()), false);
    parallel.run(&scenes);
    sequential.run(&scenes);

    assert_eq!(comparable(&parallel.events()), comparable(&sequential.events()));
    assert_eq!(parallel.pipeline.stats(), sequential.pipeline.stats());
}

fn count_jpegs(path: &Path) -> usize {
    let bytes = std::fs::read(path).unwrap();
    bytes
        .windows(3)
        .filter(|w| w[0] == 0xFF && w[1] == 0xD8 && w[2] == 0xFF)
        .count()
}

/// Events with clip paths reduced to file names, so runs in different
/// directories can be compared.
fn comparable(events: &[DetectionEvent]) -> Vec<(String, EventType, Option<f32>, Option<String>)> {
    events
        .iter()
        .map(|e| {
            (
                e.timestamp_text(),
                e.event_type,
                e.confidence,
                e.clip_path
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned()),
            )
        })
        .collect()
}

fn scene_strategy() -> impl Strategy<Value = Vec<Scene>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(Scene::Static),
            1 => Just(Scene::Intruder),
            1 => Just(Scene::Dark),
        ],
        1..24,
    )
}

/// Number of maximal runs of `pred` in `scenes[1..]` that are followed by
/// a frame where `pred` is false.
fn closed_runs(scenes: &[Scene], pred: impl Fn(Scene) -> bool) -> usize {
    scenes
        .windows(2)
        .skip(1)
        .filter(|w| pred(w[0]) && !pred(w[1]))
        .count()
}

/// Number of maximal runs of `pred` in `scenes`.
fn runs(scenes: &[Scene], pred: impl Fn(Scene) -> bool) -> usize {
    let mut prev = false;
    let mut count = 0;
    for scene in scenes {
        let now = pred(*scene);
        if now && !prev {
            count += 1;
        }
        prev = now;
    }
    count
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn replay_is_deterministic_and_edge_triggered(tail in scene_strategy()) {
        let mut scenes = vec![Scene::Static];
        scenes.extend(tail);

        let mut first = Harness::new(ScriptedClassifier::default());
        let mut second = Harness::new(ScriptedClassifier::default());
        first.run(&scenes);
        second.run(&scenes);

        let events = first.events();
        prop_assert_eq!(comparable(&events), comparable(&second.events()));

        let tamper = events.iter().filter(|e| e.event_type == EventType::Tamper).count();
        prop_assert_eq!(tamper, runs(&scenes, |s| s == Scene::Dark));

        let motion = events.iter().filter(|e| e.event_type == EventType::Motion).count();
        prop_assert_eq!(motion, closed_runs(&scenes, |s| s != Scene::Static));
    }
}
