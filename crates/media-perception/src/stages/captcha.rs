//! CAPTCHA heuristic
//!
//! CAPTCHAs are small frames packed with distorted strokes: high edge
//! density inside bounded dimensions. Both conditions must hold, so a
//! busy full-page screenshot or an ordinary small thumbnail is not flagged.

use image::DynamicImage;

use crate::errors::PerceptionError;
use crate::stages::{edge_density, to_gray};

/// Edge density above which a small frame reads as a CAPTCHA.
pub const CAPTCHA_EDGE_DENSITY: f64 = 0.15;

/// Maximum width/height for the CAPTCHA size gate, exclusive.
pub const CAPTCHA_MAX_DIMENSION: u32 = 300;

pub fn detect_captcha(frame: &DynamicImage) -> Result<bool, PerceptionError> {
    let (width, height) = (frame.width(), frame.height());
    if width >= CAPTCHA_MAX_DIMENSION || height >= CAPTCHA_MAX_DIMENSION {
        return Ok(false);
    }

    let gray = to_gray(frame);
    Ok(edge_density(&gray) > CAPTCHA_EDGE_DENSITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn noisy_frame(width: u32, height: u32) -> DynamicImage {
        // 2px stripes: every interior pixel carries a strong gradient.
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, _y| {
            if (x / 2) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn small_edge_dense_frame_is_captcha() {
        assert!(detect_captcha(&noisy_frame(200, 80)).unwrap());
    }

    #[test]
    fn large_edge_dense_frame_is_not_captcha() {
        assert!(!detect_captcha(&noisy_frame(1024, 768)).unwrap());
    }

    #[test]
    fn small_uniform_frame_is_not_captcha() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([255, 255, 255])));
        assert!(!detect_captcha(&frame).unwrap());
    }
}
