//! Frame type representing a captured image with metadata.

use chrono::{DateTime, Local};
use image::{GrayImage, Luma, RgbImage};

/// A single captured frame from the camera.
///
/// Frames are immutable once captured. Every detector reads the same
/// frame; annotation happens on copies.
#[derive(Clone)]
pub struct Frame {
    /// Colour pixel data.
    image: RgbImage,
    /// Wall-clock capture time, used for event timestamps and clip names.
    captured_at: DateTime<Local>,
    /// Monotonic sequence number.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame stamped with the current time.
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self::with_timestamp(image, sequence, Local::now())
    }

    /// Creates a new frame with an explicit capture time.
    pub fn with_timestamp(image: RgbImage, sequence: u64, captured_at: DateTime<Local>) -> Self {
        Self {
            image,
            captured_at,
            sequence,
        }
    }

    /// Creates a frame where every pixel has the same grey level.
    pub fn uniform(width: u32, height: u32, level: u8, sequence: u64) -> Self {
        Self::new(
            RgbImage::from_pixel(width, height, image::Rgb([level, level, level])),
            sequence,
        )
    }

    /// Returns the colour image.
    #[inline]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }

    /// Converts the frame to single-channel luma with BT.601 weights
    /// (0.299 R + 0.587 G + 0.114 B), rounded to the nearest level.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b] = self.image.get_pixel(x, y).0;
            Luma([bt601_luma(r, g, b)])
        })
    }

    /// Returns true if the frame has non-zero dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixel_count() > 0
    }
}

fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((weighted + 500) / 1000) as u8
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
