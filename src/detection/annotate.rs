//! Overlay drawing for the annotated output stream.

use super::Detection;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

const WARNING_RED: Rgb<u8> = Rgb([220, 20, 20]);
const BOX_GREEN: Rgb<u8> = Rgb([40, 220, 40]);

/// Height of the tamper banner in pixels.
const BANNER_HEIGHT: u32 = 24;

/// Marks a frame as tampered: a red banner along the top edge and a red
/// frame border.
pub fn draw_tamper_warning(image: &mut RgbImage) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    draw_filled_rect_mut(
        image,
        Rect::at(0, 0).of_size(width, BANNER_HEIGHT.min(height)),
        WARNING_RED,
    );
    for inset in 0..3i32 {
        let (w, h) = (width as i32 - 2 * inset, height as i32 - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            image,
            Rect::at(inset, inset).of_size(w as u32, h as u32),
            WARNING_RED,
        );
    }
}

/// Draws one box per detection.
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        let bbox = &detection.bbox;
        if bbox.width == 0 || bbox.height == 0 {
            continue;
        }
        draw_hollow_rect_mut(
            image,
            Rect::at(bbox.x, bbox.y).of_size(bbox.width, bbox.height),
            BOX_GREEN,
        );
    }
}
