//! Hardware camera backed by `nokhwa`.

use super::{Camera, CameraError, CaptureConfig, Frame};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};

/// A local capture device (webcam).
pub struct DeviceCamera {
    inner: Option<nokhwa::Camera>,
    sequence: u64,
}

impl DeviceCamera {
    pub fn new() -> Self {
        Self {
            inner: None,
            sequence: 0,
        }
    }
}

impl Default for DeviceCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for DeviceCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::MJPEG,
                config.fps,
            ),
        ));

        let mut camera = nokhwa::Camera::new(CameraIndex::Index(config.device_id), format)
            .map_err(|e| CameraError::DeviceNotFound(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        tracing::info!(
            device = config.device_id,
            resolution = ?camera.resolution(),
            "Capture device opened"
        );

        self.inner = Some(camera);
        self.sequence = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let camera = self.inner.as_mut().ok_or(CameraError::NotInitialized)?;

        let buffer = camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let image = RgbImage::from_raw(width, height, decoded.into_raw()).ok_or_else(|| {
            CameraError::CaptureFailed("decoded buffer does not match its dimensions".into())
        })?;

        self.sequence += 1;
        Ok(Frame::new(image, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.inner.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Failed to stop capture stream: {}", e);
            }
            tracing::info!("Capture device closed");
        }
    }
}
