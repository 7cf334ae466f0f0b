//! Background-difference motion detection.
//!
//! Each frame is reduced to blurred grayscale, differenced against the
//! background reference, thresholded, dilated to merge neighbouring
//! blobs, and traced for external contours. Motion is reported when any
//! contour encloses at least the configured area.

use super::{BackgroundModel, DetectionVerdict};
use crate::capture::{ConfigError, Frame};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

/// Motion verdict; metadata is the largest external contour area in pixels.
pub type MotionVerdict = DetectionVerdict<f64>;

/// Motion detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Gaussian sigma for noise suppression (3.5 matches a 21x21 kernel).
    pub blur_sigma: f32,
    /// Per-pixel difference above which a pixel counts as changed.
    pub diff_threshold: u8,
    /// Dilation passes with a 3x3 element.
    pub dilate_iterations: u8,
    /// Minimum contour area (inclusive) that counts as motion.
    pub min_contour_area: f64,
    /// Frames between background refresh attempts.
    pub refresh_interval: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 3.5,
            diff_threshold: 40,
            dilate_iterations: 2,
            min_contour_area: 3000.0,
            refresh_interval: 100,
        }
    }
}

impl MotionConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.blur_sigma > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "motion.blur_sigma",
                reason: "must be positive".into(),
            });
        }
        if self.min_contour_area < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "motion.min_contour_area",
                reason: "must not be negative".into(),
            });
        }
        if self.refresh_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "motion.refresh_interval",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Converts a frame to the blurred grayscale form used for differencing.
pub fn preprocess(frame: &Frame, blur_sigma: f32) -> GrayImage {
    imageproc::filter::gaussian_blur_f32(&frame.to_gray(), blur_sigma)
}

/// Compares a blurred frame against the reference.
///
/// Both images must share dimensions; mismatched inputs never trigger.
pub fn detect_motion(blurred: &GrayImage, reference: &GrayImage, config: &MotionConfig) -> MotionVerdict {
    if blurred.dimensions() != reference.dimensions() {
        return MotionVerdict::new(false, 0.0);
    }

    let (width, height) = blurred.dimensions();
    let mask_pixels: Vec<u8> = blurred
        .as_raw()
        .iter()
        .zip(reference.as_raw())
        .map(|(&a, &b)| if a.abs_diff(b) > config.diff_threshold { 255 } else { 0 })
        .collect();

    let Some(mask) = GrayImage::from_raw(width, height, mask_pixels) else {
        return MotionVerdict::new(false, 0.0);
    };

    let mask = if config.dilate_iterations > 0 {
        imageproc::morphology::dilate(&mask, Norm::LInf, config.dilate_iterations)
    } else {
        mask
    };

    let max_area = largest_external_contour(&mask);
    MotionVerdict::new(area_triggers(max_area, config.min_contour_area), max_area)
}

/// Inclusive area comparison.
#[inline]
pub fn area_triggers(area: f64, min_area: f64) -> bool {
    area >= min_area
}

fn largest_external_contour(mask: &GrayImage) -> f64 {
    if !mask.pixels().any(|&Luma([p])| p > 0) {
        return 0.0;
    }

    find_contours::<i32>(mask)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| imageproc::geometry::contour_area(&c.points).abs())
        .fold(0.0, f64::max)
}

/// Stateful motion detector owning the background reference.
#[derive(Debug, Clone)]
pub struct MotionDetector {
    config: MotionConfig,
    background: BackgroundModel,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        let background = BackgroundModel::new(config.refresh_interval);
        Self { config, background }
    }

    /// Processes a frame.
    ///
    /// Returns `None` while the background is being initialised (the first
    /// frame, or the first frame after a geometry change). The frame
    /// counter advances on every call; the reference is refreshed on
    /// counter multiples of the interval when this frame showed no motion.
    pub fn process(&mut self, frame: &Frame) -> Option<MotionVerdict> {
        let blurred = preprocess(frame, self.config.blur_sigma);
        self.background.record_frame();

        if let Some(reference) = self.background.reference() {
            if reference.dimensions() != blurred.dimensions() {
                tracing::info!(
                    from = ?reference.dimensions(),
                    to = ?blurred.dimensions(),
                    "Frame size changed, resetting background"
                );
                self.background.reset();
            }
        }

        let verdict = self
            .background
            .reference()
            .map(|reference| detect_motion(&blurred, reference, &self.config));

        let Some(verdict) = verdict else {
            self.background.initialize(blurred);
            return None;
        };

        tracing::trace!(
            frame = frame.sequence(),
            triggered = verdict.triggered,
            max_area = verdict.metadata,
            "Motion evaluated"
        );

        self.background.maybe_refresh(blurred, verdict.triggered);
        Some(verdict)
    }

    /// Returns the background model.
    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &MotionConfig {
        &self.config
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}
