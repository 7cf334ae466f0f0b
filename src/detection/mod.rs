//! Per-frame detectors.
//!
//! Three independent signals are computed for every frame:
//!
//! - **motion**: deviation from an adaptive background reference
//! - **tamper**: global darkness suggesting a covered lens
//! - **object**: a confident hit from an external object detector
//!
//! None of the detectors depend on each other's output, so they may be
//! evaluated in any order or concurrently.

pub mod annotate;
mod background;
mod motion;
mod object;
mod tamper;

pub use background::BackgroundModel;
pub use motion::{area_triggers, detect_motion, preprocess, MotionConfig, MotionDetector, MotionVerdict};
pub use object::{
    BoundingBox, ClassifierError, Detection, Inference, NullClassifier, ObjectAdapter,
    ObjectClassifier, ObjectConfig, ObjectOutcome, ObjectVerdict, ScriptedClassifier,
};
pub use tamper::{mean_intensity, TamperConfig, TamperDetector, TamperVerdict};

/// Per-frame output of one detector.
///
/// `metadata` carries the signal-specific measurement: contour area for
/// motion, mean intensity for tamper, confidence for object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionVerdict<M> {
    pub triggered: bool,
    pub metadata: M,
}

impl<M> DetectionVerdict<M> {
    pub fn new(triggered: bool, metadata: M) -> Self {
        Self {
            triggered,
            metadata,
        }
    }
}
