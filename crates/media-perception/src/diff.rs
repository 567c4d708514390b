//! Structural comparison between two frames
//!
//! Used by the action validator's visual signal: a simplified structural
//! similarity (1.0 = identical) plus the raw changed-pixel percentage.

use image::{DynamicImage, GenericImageView};

use crate::errors::PerceptionError;
use crate::models::FrameDiff;

/// Per-channel normalized difference above which a pixel counts as changed.
const PIXEL_CHANGE_THRESHOLD: f64 = 0.01;

/// Compare two encoded frames. Fails if either cannot be decoded or the
/// dimensions do not match.
pub fn compare_frames(before: &[u8], after: &[u8]) -> Result<FrameDiff, PerceptionError> {
    let img_before = decode(before)?;
    let img_after = decode(after)?;

    if img_before.dimensions() != img_after.dimensions() {
        return Err(PerceptionError::DimensionMismatch(format!(
            "{:?} vs {:?}",
            img_before.dimensions(),
            img_after.dimensions()
        )));
    }

    let (width, height) = img_before.dimensions();
    let total = (width as u64 * height as u64).max(1);

    let mut changed = 0u64;
    let mut abs_gray_diff = 0.0f64;

    for y in 0..height {
        for x in 0..width {
            let p1 = img_before.get_pixel(x, y);
            let p2 = img_after.get_pixel(x, y);

            let channel_diff: f64 = (0..4)
                .map(|c| (p1[c] as f64 - p2[c] as f64).abs())
                .sum::<f64>()
                / (255.0 * 4.0);
            if channel_diff > PIXEL_CHANGE_THRESHOLD {
                changed += 1;
            }

            let g1 = gray_value(p1[0], p1[1], p1[2]);
            let g2 = gray_value(p2[0], p2[1], p2[2]);
            abs_gray_diff += (g1 - g2).abs();
        }
    }

    Ok(FrameDiff {
        pixel_diff_percent: changed as f64 / total as f64 * 100.0,
        structural_similarity: 1.0 - (abs_gray_diff / total as f64),
    })
}

fn decode(data: &[u8]) -> Result<DynamicImage, PerceptionError> {
    image::load_from_memory(data).map_err(|e| PerceptionError::DecodeFailed(e.to_string()))
}

fn gray_value(r: u8, g: u8, b: u8) -> f64 {
    (r as f64 * 0.299 + g as f64 * 0.587 + b as f64 * 0.114) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn encode(width: u32, height: u32, pixel: Rgb<u8>) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, pixel);
        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageFormat::Png,
        )
        .unwrap();
        buf
    }

    #[test]
    fn identical_frames_are_fully_similar() {
        let frame = encode(50, 50, Rgb([180, 40, 90]));
        let diff = compare_frames(&frame, &frame).unwrap();
        assert_eq!(diff.pixel_diff_percent, 0.0);
        assert!((diff.structural_similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn opposite_frames_are_dissimilar() {
        let white = encode(50, 50, Rgb([255, 255, 255]));
        let black = encode(50, 50, Rgb([0, 0, 0]));
        let diff = compare_frames(&white, &black).unwrap();
        assert_eq!(diff.pixel_diff_percent, 100.0);
        assert!(diff.structural_similarity < 0.1);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let a = encode(50, 50, Rgb([0, 0, 0]));
        let b = encode(60, 50, Rgb([0, 0, 0]));
        assert!(matches!(
            compare_frames(&a, &b),
            Err(PerceptionError::DimensionMismatch(_))
        ));
    }
}
