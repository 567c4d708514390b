//! Quality scoring
//!
//! Composite of resolution, sharpness (Laplacian variance), and exposure,
//! weighted 0.3 / 0.4 / 0.3 and clamped to [0, 1].

use image::DynamicImage;

use crate::errors::PerceptionError;
use crate::stages::to_gray;

const REFERENCE_PIXELS: f64 = 1920.0 * 1080.0;
const SHARPNESS_NORMALIZER: f64 = 1000.0;

pub fn assess_quality(frame: &DynamicImage) -> Result<f64, PerceptionError> {
    let (width, height) = (frame.width(), frame.height());
    if width == 0 || height == 0 {
        return Ok(0.0);
    }

    let gray = to_gray(frame);

    let resolution_score = ((width as f64 * height as f64) / REFERENCE_PIXELS).min(1.0);
    let sharpness_score = (laplacian_variance(&gray) / SHARPNESS_NORMALIZER).min(1.0);

    let mean_intensity =
        gray.as_raw().iter().map(|&p| p as f64).sum::<f64>() / gray.as_raw().len() as f64;
    let exposure_score = 1.0 - (mean_intensity - 128.0).abs() / 128.0;

    let score = resolution_score * 0.3 + sharpness_score * 0.4 + exposure_score * 0.3;
    Ok(score.clamp(0.0, 1.0))
}

/// Variance of the 4-neighbor Laplacian response; flat frames score 0.
fn laplacian_variance(gray: &image::GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = gray.get_pixel(x, y)[0] as f64;
            let response = gray.get_pixel(x - 1, y)[0] as f64
                + gray.get_pixel(x + 1, y)[0] as f64
                + gray.get_pixel(x, y - 1)[0] as f64
                + gray.get_pixel(x, y + 1)[0] as f64
                - 4.0 * center;
            responses.push(response);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    responses.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n
}
