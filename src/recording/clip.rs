//! Clip writers.
//!
//! The default writer produces Motion-JPEG streams: each frame is a
//! complete JPEG image appended to the file, playable by common video
//! tools.

use super::RecordingError;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// An open clip resource.
pub trait ClipWriter {
    /// Appends one frame.
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RecordingError>;

    /// Flushes and closes the clip.
    fn finish(self: Box<Self>) -> Result<(), RecordingError>;

    /// Frames written so far.
    fn frames_written(&self) -> u64;
}

/// Opens clip resources.
pub trait ClipFactory {
    /// File extension (without dot) of produced clips.
    fn extension(&self) -> &str;

    /// Opens a new clip at `path`.
    fn open(&mut self, path: &Path, width: u32, height: u32) -> Result<Box<dyn ClipWriter>, RecordingError>;
}

/// Produces Motion-JPEG clips.
#[derive(Debug, Clone)]
pub struct MjpegClipFactory {
    quality: u8,
}

impl MjpegClipFactory {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for MjpegClipFactory {
    fn default() -> Self {
        Self::new(80)
    }
}

impl ClipFactory for MjpegClipFactory {
    fn extension(&self) -> &str {
        "mjpeg"
    }

    fn open(&mut self, path: &Path, width: u32, height: u32) -> Result<Box<dyn ClipWriter>, RecordingError> {
        let file = File::create(path).map_err(|source| RecordingError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Box::new(MjpegClipWriter {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            dimensions: (width, height),
            quality: self.quality,
            frames: 0,
        }))
    }
}

/// Motion-JPEG clip on disk.
pub struct MjpegClipWriter {
    out: BufWriter<File>,
    path: PathBuf,
    dimensions: (u32, u32),
    quality: u8,
    frames: u64,
}

impl ClipWriter for MjpegClipWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RecordingError> {
        if frame.dimensions() != self.dimensions {
            return Err(RecordingError::Geometry {
                expected: self.dimensions,
                actual: frame.dimensions(),
            });
        }

        JpegEncoder::new_with_quality(&mut self.out, self.quality)
            .encode_image(frame)
            .map_err(|e| RecordingError::Encode(e.to_string()))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), RecordingError> {
        self.out.flush().map_err(|source| RecordingError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), frames = self.frames, "Clip flushed");
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_mjpeg_clip_contains_jpeg_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");
        let mut factory = MjpegClipFactory::default();

        let mut writer = factory.open(&path, 32, 24).unwrap();
        let frame = RgbImage::from_pixel(32, 24, Rgb([120, 30, 200]));
        writer.write_frame(&frame).unwrap();
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.frames_written(), 2);
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let soi = bytes.windows(2).filter(|w| w[0] == 0xFF && w[1] == 0xD8).count();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
        assert!(soi >= 2);
    }

    #[test]
    fn test_geometry_change_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = MjpegClipFactory::default();
        let mut writer = factory.open(&dir.path().join("clip.mjpeg"), 32, 24).unwrap();

        assert!(matches!(
            writer.write_frame(&RgbImage::new(16, 16)),
            Err(RecordingError::Geometry { .. })
        ));
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = MjpegClipFactory::default();

        assert!(matches!(
            factory.open(&dir.path().join("absent/clip.mjpeg"), 8, 8),
            Err(RecordingError::Open { .. })
        ));
    }
}
