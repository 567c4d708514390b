//! Injected perception capabilities
//!
//! OCR and face detection are optional heavy backends. They are modeled as
//! injected traits with no-op defaults so the engine runs (with degraded
//! fields) whether or not a real implementation is wired in.

use async_trait::async_trait;
use image::DynamicImage;

use crate::errors::PerceptionError;
use crate::models::TextRegion;

/// Text recognition capability (OCR).
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text regions in the frame. An empty vec is a valid answer.
    async fn recognize(&self, frame: &DynamicImage) -> Result<Vec<TextRegion>, PerceptionError>;

    /// Human-readable backend name for health reporting.
    fn name(&self) -> &'static str;
}

/// Face presence capability.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Whether the frame contains at least one face.
    async fn has_faces(&self, frame: &DynamicImage) -> Result<bool, PerceptionError>;

    fn name(&self) -> &'static str;
}

/// Default recognizer: no backend, recognizes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTextRecognizer;

#[async_trait]
impl TextRecognizer for NoopTextRecognizer {
    async fn recognize(&self, _frame: &DynamicImage) -> Result<Vec<TextRegion>, PerceptionError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "noop-ocr"
    }
}

/// Default detector: no backend, never reports faces.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFaceDetector;

#[async_trait]
impl FaceDetector for NoopFaceDetector {
    async fn has_faces(&self, _frame: &DynamicImage) -> Result<bool, PerceptionError> {
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "noop-face"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_capabilities_return_defaults() {
        let frame = DynamicImage::new_rgb8(8, 8);

        let ocr = NoopTextRecognizer;
        assert!(ocr.recognize(&frame).await.unwrap().is_empty());

        let faces = NoopFaceDetector;
        assert!(!faces.has_faces(&frame).await.unwrap());
    }
}
