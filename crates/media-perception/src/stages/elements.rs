//! Element detection via edge-band heuristics
//!
//! A lightweight stand-in for contour analysis: rows with dense edges are
//! grouped into horizontal bands, each band's dense column span becomes a
//! candidate box, and boxes are classified by position and aspect ratio.

use image::DynamicImage;
use tracing::debug;

use crate::errors::PerceptionError;
use crate::models::{BoundingBox, ContentCategory, DetectedElement};
use crate::stages::{sobel_magnitude, to_gray, EDGE_THRESHOLD};

/// Minimum pixel area for a band to count as a button-like element.
const MIN_BUTTON_AREA: u64 = 500;

/// Minimum pixel area for a band to count as a form-like element.
const MIN_FORM_AREA: u64 = 1000;

/// Fraction of a row's pixels that must be edges for the row to be "dense".
const DENSE_ROW_FRACTION: f64 = 0.08;

pub fn detect_elements(frame: &DynamicImage) -> Result<Vec<DetectedElement>, PerceptionError> {
    let gray = to_gray(frame);
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return Ok(Vec::new());
    }

    // Per-row edge counts and per-column edge presence.
    let mut row_counts = vec![0u32; height as usize];
    let mut col_counts = vec![0u32; width as usize];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if sobel_magnitude(&gray, x, y) > EDGE_THRESHOLD {
                row_counts[y as usize] += 1;
                col_counts[x as usize] += 1;
            }
        }
    }

    let dense_row = |y: usize| row_counts[y] as f64 / width as f64 >= DENSE_ROW_FRACTION;

    // Group contiguous dense rows into bands.
    let mut elements = Vec::new();
    let mut band_start: Option<usize> = None;
    for y in 0..height as usize {
        match (dense_row(y), band_start) {
            (true, None) => band_start = Some(y),
            (false, Some(start)) => {
                if let Some(element) = classify_band(start, y, &col_counts, width, height) {
                    elements.push(element);
                }
                band_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = band_start {
        if let Some(element) = classify_band(start, height as usize, &col_counts, width, height) {
            elements.push(element);
        }
    }

    debug!(count = elements.len(), "element detection complete");
    Ok(elements)
}

fn classify_band(
    start: usize,
    end: usize,
    col_counts: &[u32],
    width: u32,
    height: u32,
) -> Option<DetectedElement> {
    let band_height = (end - start) as u32;
    if band_height == 0 {
        return None;
    }

    // Horizontal extent: span of columns that carry any edges.
    let first_col = col_counts.iter().position(|&c| c > 0)? as u32;
    let last_col = col_counts.iter().rposition(|&c| c > 0)? as u32;
    let band_width = last_col.saturating_sub(first_col) + 1;

    let bbox = BoundingBox {
        x: first_col,
        y: start as u32,
        width: band_width,
        height: band_height,
    };
    let aspect = band_width as f64 / band_height as f64;

    // Wide bands near the top read as navigation chrome.
    if band_width as f64 > width as f64 * 0.5 && (start as f64) < height as f64 * 0.2 {
        return Some(DetectedElement {
            category: ContentCategory::Navigation,
            bounding_box: bbox,
            confidence: 0.8,
            clickable: false,
            interactive: true,
            visible: true,
        });
    }

    // Long, shallow bands read as form fields.
    if aspect > 5.0 && bbox.area() >= MIN_FORM_AREA {
        return Some(DetectedElement {
            category: ContentCategory::Form,
            bounding_box: bbox,
            confidence: 0.6,
            clickable: false,
            interactive: true,
            visible: true,
        });
    }

    // Compact bands with button-like proportions.
    if (0.2..=5.0).contains(&aspect) && bbox.area() >= MIN_BUTTON_AREA {
        return Some(DetectedElement {
            category: ContentCategory::Button,
            bounding_box: bbox,
            confidence: 0.7,
            clickable: true,
            interactive: true,
            visible: true,
        });
    }

    None
}
