//! Camera input and frame handling.
//!
//! This module provides the frame source consumed by the pipeline: a
//! camera trait, a scripted/synthetic mock, and (with the `camera`
//! feature) a hardware device backed by `nokhwa`.

mod camera;
mod config;
#[cfg(feature = "camera")]
mod device;
mod frame;

pub use camera::{Camera, CameraError, CameraGuard, MockCamera};
pub use config::{CaptureConfig, ConfigError};
#[cfg(feature = "camera")]
pub use device::DeviceCamera;
pub use frame::Frame;
