//! Annotated frame output.

use image::RgbImage;
use std::path::PathBuf;

/// Receives every annotated frame after the recording step.
///
/// Sinks handle their own failures; presenting a frame never fails the
/// pipeline.
pub trait FrameSink {
    fn present(&mut self, sequence: u64, annotated: &RgbImage);
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, sequence: u64, annotated: &RgbImage) {
        (**self).present(sequence, annotated)
    }
}

/// Discards frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFrameSink;

impl FrameSink for NullFrameSink {
    fn present(&mut self, _sequence: u64, _annotated: &RgbImage) {}
}

/// Periodically writes the latest annotated frame to a JPEG file.
///
/// The file is replaced atomically so viewers never see a partial image.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    path: PathBuf,
    every: u64,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            path: path.into(),
            every: every.max(1),
        }
    }

    fn write(&self, annotated: &RgbImage) -> Result<(), image::ImageError> {
        let staging = self.path.with_extension("partial.jpg");
        annotated.save_with_format(&staging, image::ImageFormat::Jpeg)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl FrameSink for SnapshotSink {
    fn present(&mut self, sequence: u64, annotated: &RgbImage) {
        if sequence % self.every != 0 {
            return;
        }
        if let Err(e) = self.write(annotated) {
            tracing::warn!(path = %self.path.display(), "Failed to write snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_written_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.jpg");
        let mut sink = SnapshotSink::new(&path, 5);
        let image = RgbImage::new(16, 16);

        sink.present(4, &image);
        assert!(!path.exists());

        sink.present(5, &image);
        assert!(path.exists());
        assert_eq!(image::open(&path).unwrap().width(), 16);
    }
}
