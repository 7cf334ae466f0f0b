//! Lens obstruction detection from global brightness.

use super::DetectionVerdict;
use crate::capture::{ConfigError, Frame};
use serde::{Deserialize, Serialize};

/// Tamper verdict; metadata is the mean grayscale intensity (0-255).
pub type TamperVerdict = DetectionVerdict<f64>;

/// Tamper detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TamperConfig {
    /// Mean intensity strictly below this counts as obstruction.
    pub low_light_threshold: f64,
}

impl Default for TamperConfig {
    fn default() -> Self {
        Self {
            low_light_threshold: 20.0,
        }
    }
}

impl TamperConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=255.0).contains(&self.low_light_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "tamper.low_light_threshold",
                reason: "must be within 0-255".into(),
            });
        }
        Ok(())
    }
}

/// Stateless per-frame obstruction check.
#[derive(Debug, Clone, Default)]
pub struct TamperDetector {
    config: TamperConfig,
}

impl TamperDetector {
    pub fn new(config: TamperConfig) -> Self {
        Self { config }
    }

    /// Flags the frame when its mean intensity falls below the threshold.
    pub fn detect(&self, frame: &Frame) -> TamperVerdict {
        let mean = mean_intensity(frame);
        TamperVerdict::new(mean < self.config.low_light_threshold, mean)
    }
}

/// Mean grayscale intensity of a frame.
pub fn mean_intensity(frame: &Frame) -> f64 {
    let gray = frame.to_gray();
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }

    let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
    sum as f64 / pixels.len() as f64
}
