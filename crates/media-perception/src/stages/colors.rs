//! Dominant color analysis via k-means clustering
//!
//! Deterministic: initial centroids are taken at even strides through the
//! sampled pixels, so the same frame always yields the same palette.

use image::DynamicImage;

use crate::errors::PerceptionError;

pub const DOMINANT_COLOR_COUNT: usize = 5;

const MAX_SAMPLES: usize = 10_000;
const MAX_ITERATIONS: usize = 10;

pub fn dominant_colors(frame: &DynamicImage) -> Result<Vec<(u8, u8, u8)>, PerceptionError> {
    let rgb = frame.to_rgb8();
    let pixels: Vec<[f64; 3]> = sample_pixels(rgb.as_raw());
    if pixels.is_empty() {
        return Ok(Vec::new());
    }

    // Deterministic initialization: the first k distinct colors in sample
    // order. A frame with fewer distinct colors gets fewer clusters.
    let mut centroids: Vec<[f64; 3]> = Vec::new();
    for pixel in &pixels {
        if centroids.len() == DOMINANT_COLOR_COUNT {
            break;
        }
        if !centroids.iter().any(|c| c == pixel) {
            centroids.push(*pixel);
        }
    }
    let k = centroids.len();
    let mut assignments = vec![0usize; pixels.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, pixel) in pixels.iter().enumerate() {
            let nearest = nearest_centroid(pixel, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (pixel, &cluster) in pixels.iter().zip(&assignments) {
            for c in 0..3 {
                sums[cluster][c] += pixel[c];
            }
            counts[cluster] += 1;
        }
        for cluster in 0..k {
            if counts[cluster] > 0 {
                for c in 0..3 {
                    centroids[cluster][c] = sums[cluster][c] / counts[cluster] as f64;
                }
            }
        }
    }

    // Rank clusters by population, largest first.
    let mut counts = vec![0usize; k];
    for &cluster in &assignments {
        counts[cluster] += 1;
    }
    let mut ranked: Vec<usize> = (0..k).collect();
    ranked.sort_by(|&a, &b| counts[b].cmp(&counts[a]));

    Ok(ranked
        .into_iter()
        .filter(|&cluster| counts[cluster] > 0)
        .map(|cluster| {
            let c = centroids[cluster];
            (
                c[0].round().clamp(0.0, 255.0) as u8,
                c[1].round().clamp(0.0, 255.0) as u8,
                c[2].round().clamp(0.0, 255.0) as u8,
            )
        })
        .collect())
}

fn sample_pixels(raw: &[u8]) -> Vec<[f64; 3]> {
    let total = raw.len() / 3;
    if total == 0 {
        return Vec::new();
    }
    let stride = (total / MAX_SAMPLES).max(1);
    (0..total)
        .step_by(stride)
        .map(|i| {
            [
                raw[i * 3] as f64,
                raw[i * 3 + 1] as f64,
                raw[i * 3 + 2] as f64,
            ]
        })
        .collect()
}

fn nearest_centroid(pixel: &[f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist: f64 = pixel
            .iter()
            .zip(centroid)
            .map(|(p, c)| (p - c) * (p - c))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    #[test]
    fn solid_frame_yields_its_color_first() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, Rgb([10, 200, 30])));
        let colors = dominant_colors(&frame).unwrap();
        assert_eq!(colors[0], (10, 200, 30));
    }

    #[test]
    fn two_tone_frame_leads_with_the_majority_color() {
        // 3/4 red, 1/4 blue.
        let frame = DynamicImage::ImageRgb8(RgbImage::from_fn(80, 80, |x, _y| {
            if x < 60 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        }));
        let colors = dominant_colors(&frame).unwrap();
        let (r, _g, b) = colors[0];
        assert!(r > 200 && b < 50, "majority cluster should be red-dominant");
    }

    #[test]
    fn analysis_is_deterministic() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        }));
        assert_eq!(
            dominant_colors(&frame).unwrap(),
            dominant_colors(&frame).unwrap()
        );
    }
}
