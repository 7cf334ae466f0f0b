//! Adapter around an external object detector.
//!
//! The detector itself is opaque: it takes a frame and a confidence floor
//! and hands back labelled boxes plus an annotated copy of the frame. The
//! adapter turns that into a single verdict.

use super::{annotate, DetectionVerdict};
use crate::capture::{ConfigError, Frame};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Object verdict; metadata is the confidence of the qualifying detection.
pub type ObjectVerdict = DetectionVerdict<Option<f32>>;

/// Errors reported by an object classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// A single labelled detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Raw classifier output for one frame.
#[derive(Debug, Clone)]
pub struct Inference {
    /// Detections in the order the model produced them.
    pub detections: Vec<Detection>,
    /// Frame copy with every detection drawn.
    pub annotated: RgbImage,
}

/// Trait for pretrained detector implementations.
///
/// Implementations are stateless per call from the pipeline's view.
pub trait ObjectClassifier {
    /// Runs inference on a frame.
    fn infer(&mut self, frame: &Frame, threshold: f32) -> Result<Inference, ClassifierError>;
}

impl<C: ObjectClassifier + ?Sized> ObjectClassifier for Box<C> {
    fn infer(&mut self, frame: &Frame, threshold: f32) -> Result<Inference, ClassifierError> {
        (**self).infer(frame, threshold)
    }
}

/// Classifier that never detects anything. Used when no model is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

impl ObjectClassifier for NullClassifier {
    fn infer(&mut self, frame: &Frame, _threshold: f32) -> Result<Inference, ClassifierError> {
        Ok(Inference {
            detections: Vec::new(),
            annotated: frame.image().clone(),
        })
    }
}

/// Classifier that replays a queue of per-frame results.
///
/// Once the queue is empty every call reports no detections.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    script: VecDeque<Result<Vec<Detection>, String>>,
}

impl ScriptedClassifier {
    pub fn new(script: impl IntoIterator<Item = Vec<Detection>>) -> Self {
        Self {
            script: script.into_iter().map(Ok).collect(),
        }
    }

    /// Queues a successful result.
    pub fn push(&mut self, detections: Vec<Detection>) {
        self.script.push_back(Ok(detections));
    }

    /// Queues a failure.
    pub fn push_failure(&mut self, reason: impl Into<String>) {
        self.script.push_back(Err(reason.into()));
    }
}

impl ObjectClassifier for ScriptedClassifier {
    fn infer(&mut self, frame: &Frame, _threshold: f32) -> Result<Inference, ClassifierError> {
        let detections = match self.script.pop_front() {
            Some(Ok(detections)) => detections,
            Some(Err(reason)) => return Err(ClassifierError::Inference(reason)),
            None => Vec::new(),
        };

        let mut annotated = frame.image().clone();
        annotate::draw_detections(&mut annotated, &detections);
        Ok(Inference {
            detections,
            annotated,
        })
    }
}

/// Object detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    /// Confidence floor (inclusive) for a detection to raise the alarm.
    pub min_confidence: f32,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.4,
        }
    }
}

impl ObjectConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "object.min_confidence",
                reason: "must be within 0.0-1.0".into(),
            });
        }
        Ok(())
    }
}

/// Result of classifying one frame.
#[derive(Debug, Clone)]
pub struct ObjectOutcome {
    pub verdict: ObjectVerdict,
    /// Label of the qualifying detection.
    pub label: Option<String>,
    /// Annotated frame from the classifier, or a plain copy on failure.
    pub annotated: RgbImage,
    /// True when the classifier errored and the verdict was defaulted.
    pub classifier_failed: bool,
}

/// Applies the confidence policy to classifier output.
pub struct ObjectAdapter<C> {
    classifier: C,
    config: ObjectConfig,
}

impl<C: ObjectClassifier> ObjectAdapter<C> {
    pub fn new(classifier: C, config: ObjectConfig) -> Self {
        Self { classifier, config }
    }

    /// Classifies a frame.
    ///
    /// The first detection, in model order, whose confidence reaches the
    /// floor decides the verdict; later detections are not consulted even
    /// if they score higher. Classifier errors yield a non-triggered
    /// verdict and an unannotated copy of the frame.
    pub fn classify(&mut self, frame: &Frame) -> ObjectOutcome {
        let min_confidence = self.config.min_confidence;

        let inference = match self.classifier.infer(frame, min_confidence) {
            Ok(inference) => inference,
            Err(e) => {
                tracing::warn!(frame = frame.sequence(), "Object classifier failed: {}", e);
                return ObjectOutcome {
                    verdict: ObjectVerdict::new(false, None),
                    label: None,
                    annotated: frame.image().clone(),
                    classifier_failed: true,
                };
            }
        };

        let qualifying = inference
            .detections
            .iter()
            .find(|d| d.confidence >= min_confidence);

        ObjectOutcome {
            verdict: ObjectVerdict::new(qualifying.is_some(), qualifying.map(|d| d.confidence)),
            label: qualifying.map(|d| d.label.clone()),
            annotated: inference.annotated,
            classifier_failed: false,
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }
}
