//! Analysis stages
//!
//! Each stage is a pure function over the decoded frame. The engine fans
//! them out concurrently; a failing stage degrades its field to a default
//! instead of failing the whole analysis.

pub mod accessibility;
pub mod captcha;
pub mod colors;
pub mod elements;
pub mod quality;

use image::{DynamicImage, GrayImage};

/// Fraction of pixels whose gradient magnitude exceeds the edge threshold.
pub(crate) fn edge_density(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut edge_pixels = 0u64;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if sobel_magnitude(gray, x, y) > EDGE_THRESHOLD {
                edge_pixels += 1;
            }
        }
    }

    let considered = ((width - 2) as u64) * ((height - 2) as u64);
    edge_pixels as f64 / considered as f64
}

/// Gradient magnitude above which a pixel counts as an edge.
pub(crate) const EDGE_THRESHOLD: f64 = 128.0;

/// Sobel gradient magnitude at (x, y). Caller guarantees a 1px margin.
pub(crate) fn sobel_magnitude(gray: &GrayImage, x: u32, y: u32) -> f64 {
    let p = |dx: i32, dy: i32| -> f64 {
        gray.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f64
    };

    let gx = -p(-1, -1) - 2.0 * p(-1, 0) - p(-1, 1) + p(1, -1) + 2.0 * p(1, 0) + p(1, 1);
    let gy = -p(-1, -1) - 2.0 * p(0, -1) - p(1, -1) + p(-1, 1) + 2.0 * p(0, 1) + p(1, 1);

    (gx * gx + gy * gy).sqrt()
}

/// Mean and standard deviation of grayscale intensity.
pub(crate) fn intensity_stats(gray: &GrayImage) -> (f64, f64) {
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return (0.0, 0.0);
    }

    let n = pixels.len() as f64;
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / n;
    let variance = pixels
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    (mean, variance.sqrt())
}

pub(crate) fn to_gray(frame: &DynamicImage) -> GrayImage {
    frame.to_luma8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn uniform_frame_has_no_edges() {
        let gray = GrayImage::from_pixel(64, 64, Luma([200u8]));
        assert_eq!(edge_density(&gray), 0.0);
    }

    #[test]
    fn striped_frame_is_edge_dense() {
        // 2px vertical stripes put a strong horizontal gradient on every
        // interior pixel.
        let gray = GrayImage::from_fn(64, 64, |x, _y| {
            if (x / 2) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        assert!(edge_density(&gray) > 0.5);
    }

    #[test]
    fn intensity_stats_of_flat_frame() {
        let gray = GrayImage::from_pixel(16, 16, Luma([128u8]));
        let (mean, std_dev) = intensity_stats(&gray);
        assert_eq!(mean, 128.0);
        assert_eq!(std_dev, 0.0);
    }
}
