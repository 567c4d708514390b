//! Data models for media perception results

use serde::{Deserialize, Serialize};

/// Kind of visual frame being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Screenshot,
    Canvas,
    Svg,
}

impl MediaType {
    pub fn name(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Screenshot => "screenshot",
            MediaType::Canvas => "canvas",
            MediaType::Svg => "svg",
        }
    }
}

/// Category assigned to a detected visual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Text,
    Button,
    Form,
    Navigation,
    Media,
    Captcha,
    Modal,
    Content,
    Unknown,
}

/// Accessibility compliance level derived from accumulated issue counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessibilityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl AccessibilityLevel {
    /// Pure, monotonic mapping from issue count to level:
    /// 0 issues -> excellent, <=2 -> good, <=4 -> fair, <=6 -> poor,
    /// else critical.
    pub fn from_issue_count(count: usize) -> Self {
        match count {
            0 => AccessibilityLevel::Excellent,
            1..=2 => AccessibilityLevel::Good,
            3..=4 => AccessibilityLevel::Fair,
            5..=6 => AccessibilityLevel::Poor,
            _ => AccessibilityLevel::Critical,
        }
    }
}

/// Bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// A visual element detected in the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedElement {
    pub category: ContentCategory,
    pub bounding_box: BoundingBox,

    /// Detection confidence (0.0-1.0)
    pub confidence: f64,

    pub clickable: bool,
    pub interactive: bool,
    pub visible: bool,
}

/// A region of recognized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    pub bounding_box: BoundingBox,

    /// Recognition confidence (0.0-1.0)
    pub confidence: f64,
}

/// An accessibility problem found in the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityIssue {
    /// Issue class, e.g. "low_contrast" or "small_text"
    pub issue_type: String,

    /// "warning" or "error"
    pub severity: String,

    pub description: String,
    pub location: Option<BoundingBox>,
}

/// Structured output of analyzing a single frame.
///
/// Read-only after creation; cached entries hand out shared references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAnalysis {
    pub media_type: MediaType,

    /// (width, height) of the decoded frame
    pub dimensions: (u32, u32),

    pub detected_elements: Vec<DetectedElement>,
    pub text_regions: Vec<TextRegion>,
    pub accessibility_issues: Vec<AccessibilityIssue>,
    pub accessibility_level: AccessibilityLevel,

    /// Top dominant colors, most prominent first
    pub dominant_colors: Vec<(u8, u8, u8)>,

    pub has_faces: bool,
    pub has_text: bool,
    pub is_captcha: bool,

    /// Resolution/sharpness/exposure composite in [0, 1]
    pub quality_score: f64,

    /// Wall time spent producing this analysis, in milliseconds
    pub processing_time_ms: u64,
}

impl MediaAnalysis {
    /// An empty analysis for frames that could not be decoded.
    pub fn empty(media_type: MediaType) -> Self {
        Self {
            media_type,
            dimensions: (0, 0),
            detected_elements: Vec::new(),
            text_regions: Vec::new(),
            accessibility_issues: Vec::new(),
            accessibility_level: AccessibilityLevel::Excellent,
            dominant_colors: Vec::new(),
            has_faces: false,
            has_text: false,
            is_captcha: false,
            quality_score: 0.0,
            processing_time_ms: 0,
        }
    }
}

/// Result of comparing two frames structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDiff {
    /// Percentage of pixels that differ (0.0-100.0)
    pub pixel_diff_percent: f64,

    /// Structural similarity index (0.0-1.0, 1.0 = identical)
    pub structural_similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessibility_level_mapping() {
        assert_eq!(
            AccessibilityLevel::from_issue_count(0),
            AccessibilityLevel::Excellent
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(1),
            AccessibilityLevel::Good
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(2),
            AccessibilityLevel::Good
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(3),
            AccessibilityLevel::Fair
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(4),
            AccessibilityLevel::Fair
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(5),
            AccessibilityLevel::Poor
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(6),
            AccessibilityLevel::Poor
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(7),
            AccessibilityLevel::Critical
        );
        assert_eq!(
            AccessibilityLevel::from_issue_count(50),
            AccessibilityLevel::Critical
        );
    }

    #[test]
    fn accessibility_level_is_monotonic() {
        let mut previous = AccessibilityLevel::from_issue_count(0);
        for count in 1..20 {
            let level = AccessibilityLevel::from_issue_count(count);
            assert!(level >= previous, "level regressed at {} issues", count);
            previous = level;
        }
    }

    #[test]
    fn bounding_box_geometry() {
        let bbox = BoundingBox {
            x: 10,
            y: 20,
            width: 100,
            height: 40,
        };
        assert_eq!(bbox.area(), 4000);
        assert_eq!(bbox.center(), (60, 40));
    }
}
