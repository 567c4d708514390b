//! Accessibility scan
//!
//! Heuristic checks over the frame and its recognized text: global contrast
//! and minimum text size. The level itself is derived from the issue count
//! by `AccessibilityLevel::from_issue_count`.

use image::DynamicImage;

use crate::errors::PerceptionError;
use crate::models::{AccessibilityIssue, TextRegion};
use crate::stages::{intensity_stats, to_gray};

/// Grayscale standard deviation below which the frame is low-contrast.
pub const LOW_CONTRAST_STD_DEV: f64 = 30.0;

/// Text regions shorter than this many pixels are flagged as too small.
pub const MIN_TEXT_HEIGHT_PX: u32 = 10;

pub fn scan_accessibility(
    frame: &DynamicImage,
    text_regions: &[TextRegion],
) -> Result<Vec<AccessibilityIssue>, PerceptionError> {
    let mut issues = Vec::new();

    let gray = to_gray(frame);
    let (_, std_dev) = intensity_stats(&gray);
    if std_dev < LOW_CONTRAST_STD_DEV {
        issues.push(AccessibilityIssue {
            issue_type: "low_contrast".to_string(),
            severity: "warning".to_string(),
            description: format!(
                "low color contrast (intensity std dev {:.1} < {:.0})",
                std_dev, LOW_CONTRAST_STD_DEV
            ),
            location: None,
        });
    }

    for region in text_regions {
        if region.bounding_box.height < MIN_TEXT_HEIGHT_PX {
            issues.push(AccessibilityIssue {
                issue_type: "small_text".to_string(),
                severity: "warning".to_string(),
                description: format!(
                    "text region {}px tall is below the {}px minimum",
                    region.bounding_box.height, MIN_TEXT_HEIGHT_PX
                ),
                location: Some(region.bounding_box),
            });
        }
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use image::{DynamicImage, Rgb, RgbImage};

    fn text_region(height: u32) -> TextRegion {
        TextRegion {
            text: "sample".to_string(),
            bounding_box: BoundingBox {
                x: 0,
                y: 0,
                width: 60,
                height,
            },
            confidence: 0.9,
        }
    }

    #[test]
    fn flat_frame_is_low_contrast() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([128, 128, 128])));
        let issues = scan_accessibility(&frame, &[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, "low_contrast");
    }

    #[test]
    fn high_contrast_frame_with_readable_text_is_clean() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, _y| {
            if x < 32 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }));
        let issues = scan_accessibility(&frame, &[text_region(14)]).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn tiny_text_is_flagged_per_region() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, _y| {
            if x < 32 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }));
        let issues = scan_accessibility(&frame, &[text_region(6), text_region(8)]).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.issue_type == "small_text"));
    }
}
