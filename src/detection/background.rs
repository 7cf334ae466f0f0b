//! Adaptive background reference for motion detection.
//!
//! The reference is a blurred grayscale snapshot of the static scene.
//! It is taken from the first frame and replaced wholesale at a fixed
//! frame interval, but only on frames where no motion was seen. This
//! follows slow lighting drift without absorbing moving objects.

use image::GrayImage;

/// Slowly-adapting reference image of the static scene.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    /// Current reference, absent until the first frame arrives.
    reference: Option<GrayImage>,
    /// Frames observed, including the initialising one.
    frame_counter: u64,
    /// Refresh boundary in frames.
    refresh_interval: u64,
    /// Number of wholesale replacements performed.
    refresh_count: u64,
}

impl BackgroundModel {
    /// Creates an empty model with the given refresh interval.
    pub fn new(refresh_interval: u64) -> Self {
        Self {
            reference: None,
            frame_counter: 0,
            refresh_interval: refresh_interval.max(1),
            refresh_count: 0,
        }
    }

    /// Returns the current reference if one has been captured.
    pub fn reference(&self) -> Option<&GrayImage> {
        self.reference.as_ref()
    }

    /// Returns true once a reference exists.
    pub fn is_initialized(&self) -> bool {
        self.reference.is_some()
    }

    /// Counts a processed frame and returns the new counter value.
    pub fn record_frame(&mut self) -> u64 {
        self.frame_counter += 1;
        self.frame_counter
    }

    /// Returns the number of frames observed.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Returns the number of wholesale refreshes performed.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Installs the first reference.
    pub fn initialize(&mut self, blurred: GrayImage) {
        tracing::debug!(
            width = blurred.width(),
            height = blurred.height(),
            "Background reference initialized"
        );
        self.reference = Some(blurred);
    }

    /// Replaces the reference if the current frame sits on a refresh
    /// boundary and showed no motion. Returns true when replaced.
    pub fn maybe_refresh(&mut self, blurred: GrayImage, motion: bool) -> bool {
        if motion || self.frame_counter % self.refresh_interval != 0 {
            return false;
        }

        self.reference = Some(blurred);
        self.refresh_count += 1;
        tracing::info!(frame = self.frame_counter, "Background frame updated");
        true
    }

    /// Drops the reference so the next frame re-initialises it.
    pub fn reset(&mut self) {
        self.reference = None;
    }
}
