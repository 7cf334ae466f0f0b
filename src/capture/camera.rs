//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, Frame};
use chrono::{DateTime, Duration, Local};
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// Errors that can occur during camera operations.
///
/// Every variant is fatal to the frame pipeline.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("frame source exhausted")]
    Exhausted,
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and mock implementations for testing.
pub trait Camera {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Captures a single frame.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        (**self).open(config)
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        (**self).capture()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Owns an open camera and closes it when dropped.
///
/// Release happens on every exit path, including unwinding.
pub struct CameraGuard<C: Camera> {
    camera: C,
}

impl<C: Camera> CameraGuard<C> {
    /// Opens the camera and wraps it.
    pub fn open(mut camera: C, config: &CaptureConfig) -> Result<Self, CameraError> {
        camera.open(config)?;
        Ok(Self { camera })
    }
}

impl<C: Camera> Deref for CameraGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.camera
    }
}

impl<C: Camera> DerefMut for CameraGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.camera
    }
}

impl<C: Camera> Drop for CameraGuard<C> {
    fn drop(&mut self) {
        if self.camera.is_open() {
            self.camera.close();
        }
    }
}

/// Side length of the square that wanders through the synthetic scene.
const INTRUDER_SIZE: u32 = 80;

/// Mock camera that either replays a fixed script of images or
/// synthesizes a scene.
///
/// The synthetic scene is a static gradient. Every other 150-frame window an
/// intruder block crosses it, and frames 500..540 of every 600 are blacked
/// out to simulate a covered lens. Timestamps advance by one frame interval
/// from a fixed epoch so replays are reproducible.
#[derive(Debug)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
    script: Option<VecDeque<RgbImage>>,
    epoch: Option<DateTime<Local>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            config: None,
            sequence: 0,
            script: None,
            epoch: None,
        }
    }

    /// Creates a camera that yields the given images in order, then
    /// reports [`CameraError::Exhausted`].
    pub fn scripted(images: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            script: Some(images.into_iter().collect()),
            ..Self::new()
        }
    }

    /// Fixes the timestamp of the first frame.
    pub fn with_epoch(mut self, epoch: DateTime<Local>) -> Self {
        self.epoch = Some(epoch);
        self
    }

    fn synthesize(config: &CaptureConfig, sequence: u64) -> RgbImage {
        let (width, height) = (config.width, config.height);

        if sequence % 600 >= 500 && sequence % 600 < 540 {
            return RgbImage::from_pixel(width, height, Rgb([4, 4, 4]));
        }

        let mut image = RgbImage::from_fn(width, height, |x, _| {
            let level = 60 + ((x * 120) / width.max(1)) as u8;
            Rgb([level, level, level])
        });

        if (sequence / 150) % 2 == 1 {
            let span = width.saturating_sub(INTRUDER_SIZE).max(1);
            let left = ((sequence % 150) as u32 * 4) % span;
            let top = height.saturating_sub(INTRUDER_SIZE) / 2;
            for y in top..(top + INTRUDER_SIZE).min(height) {
                for x in left..(left + INTRUDER_SIZE).min(width) {
                    image.put_pixel(x, y, Rgb([250, 250, 250]));
                }
            }
        }

        image
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        if self.epoch.is_none() {
            self.epoch = Some(Local::now());
        }
        tracing::info!("MockCamera opened with config: {:?}", config);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        let image = match self.script.as_mut() {
            Some(script) => script.pop_front().ok_or(CameraError::Exhausted)?,
            None => Self::synthesize(config, self.sequence),
        };

        let epoch = self.epoch.unwrap_or_else(Local::now);
        let offset = Duration::milliseconds((self.sequence * 1000 / config.fps as u64) as i64);

        self.sequence += 1;
        Ok(Frame::with_timestamp(image, self.sequence, epoch + offset))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        tracing::info!("MockCamera closed");
    }
}
