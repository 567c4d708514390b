//! Perception engine - cache lookup, decode, concurrent stage fan-out
//!
//! The engine owns the cache and the injected capabilities. Stages run
//! concurrently against the same decoded frame; a stage failure degrades
//! its field to a default rather than failing the analysis.

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::cache::{AnalysisCache, DEFAULT_CACHE_CAPACITY};
use crate::capability::{FaceDetector, NoopFaceDetector, NoopTextRecognizer, TextRecognizer};
use crate::errors::PerceptionError;
use crate::models::{AccessibilityLevel, MediaAnalysis, MediaType};
use crate::stages;

/// Tunables for the perception engine.
#[derive(Debug, Clone)]
pub struct PerceptionConfig {
    /// Maximum number of memoized analyses (LRU evicted beyond this).
    pub cache_capacity: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

pub struct MediaPerceptionEngine {
    cache: AnalysisCache,
    ocr: Arc<dyn TextRecognizer>,
    faces: Arc<dyn FaceDetector>,
}

impl MediaPerceptionEngine {
    /// Engine with no-op capabilities: runs everywhere, degraded fields.
    pub fn new(config: PerceptionConfig) -> Self {
        Self::with_capabilities(
            config,
            Arc::new(NoopTextRecognizer),
            Arc::new(NoopFaceDetector),
        )
    }

    pub fn with_capabilities(
        config: PerceptionConfig,
        ocr: Arc<dyn TextRecognizer>,
        faces: Arc<dyn FaceDetector>,
    ) -> Self {
        Self {
            cache: AnalysisCache::new(config.cache_capacity),
            ocr,
            faces,
        }
    }

    /// Analyze a frame, serving repeats of the same bytes from the cache.
    ///
    /// Undecodable input yields an empty analysis rather than an error: a
    /// blank frame carries no signal, which downstream consumers already
    /// handle.
    pub async fn analyze(&self, bytes: &[u8], media_type: MediaType) -> Arc<MediaAnalysis> {
        let started = Instant::now();
        let key = AnalysisCache::key_for(media_type, bytes);

        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "perception cache hit");
            return cached;
        }

        let frame = match image::load_from_memory(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "frame decode failed; returning empty analysis");
                let analysis = Arc::new(MediaAnalysis::empty(media_type));
                self.cache.insert(key, Arc::clone(&analysis));
                return analysis;
            }
        };

        let analysis = Arc::new(self.run_stages(&frame, media_type, started).await);
        self.cache.insert(key, Arc::clone(&analysis));
        analysis
    }

    /// Hit count of the analysis cache, for observability.
    pub fn cache_hits(&self) -> u64 {
        self.cache.hit_count()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    async fn run_stages(
        &self,
        frame: &DynamicImage,
        media_type: MediaType,
        started: Instant,
    ) -> MediaAnalysis {
        // Fan-out: all stages observe the same frame and none blocks
        // another. Each degrades independently on failure.
        let (elements, text_regions, colors, has_faces, quality, is_captcha) = tokio::join!(
            async { stages::elements::detect_elements(frame) },
            self.ocr.recognize(frame),
            async { stages::colors::dominant_colors(frame) },
            self.faces.has_faces(frame),
            async { stages::quality::assess_quality(frame) },
            async { stages::captcha::detect_captcha(frame) },
        );

        let detected_elements = unwrap_stage("elements", elements).unwrap_or_default();
        let text_regions = unwrap_stage("text", text_regions).unwrap_or_default();
        let dominant_colors = unwrap_stage("colors", colors).unwrap_or_default();
        let has_faces = unwrap_stage("faces", has_faces).unwrap_or(false);
        let quality_score = unwrap_stage("quality", quality).unwrap_or(0.0);
        let is_captcha = unwrap_stage("captcha", is_captcha).unwrap_or(false);

        // Accessibility runs after text extraction because it inspects the
        // recognized regions.
        let accessibility_issues =
            unwrap_stage("accessibility", stages::accessibility::scan_accessibility(frame, &text_regions))
                .unwrap_or_default();
        let accessibility_level = AccessibilityLevel::from_issue_count(accessibility_issues.len());

        MediaAnalysis {
            media_type,
            dimensions: (frame.width(), frame.height()),
            has_text: !text_regions.is_empty(),
            detected_elements,
            text_regions,
            accessibility_issues,
            accessibility_level,
            dominant_colors,
            has_faces,
            is_captcha,
            quality_score,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn unwrap_stage<T>(stage: &'static str, result: Result<T, PerceptionError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(stage = stage, error = %err, "stage degraded to default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn encode_frame(width: u32, height: u32, pixel: Rgb<u8>) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, pixel);
        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageFormat::Png,
        )
        .unwrap();
        buf
    }

    fn striped_frame(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, _y| {
            if (x / 2) % 2 == 0 {
                Rgb([255u8, 255, 255])
            } else {
                Rgb([0u8, 0, 0])
            }
        });
        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageFormat::Png,
        )
        .unwrap();
        buf
    }

    #[tokio::test]
    async fn repeat_analysis_is_served_from_cache() {
        let engine = MediaPerceptionEngine::new(PerceptionConfig::default());
        let frame = encode_frame(64, 64, Rgb([200, 200, 200]));

        let first = engine.analyze(&frame, MediaType::Screenshot).await;
        assert_eq!(engine.cache_hits(), 0);

        let second = engine.analyze(&frame, MediaType::Screenshot).await;
        assert_eq!(engine.cache_hits(), 1);

        // Bit-identical: the cached Arc is the same allocation.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn captcha_like_frame_is_flagged_without_ocr() {
        // Small and edge-dense; the engine runs with no-op OCR.
        let engine = MediaPerceptionEngine::new(PerceptionConfig::default());
        let frame = striped_frame(200, 80);

        let analysis = engine.analyze(&frame, MediaType::Screenshot).await;
        assert!(analysis.is_captcha);
        assert!(!analysis.has_text);
    }

    #[tokio::test]
    async fn undecodable_bytes_degrade_to_empty_analysis() {
        let engine = MediaPerceptionEngine::new(PerceptionConfig::default());
        let analysis = engine.analyze(b"not an image", MediaType::Image).await;
        assert_eq!(analysis.dimensions, (0, 0));
        assert_eq!(analysis.quality_score, 0.0);
    }

    #[tokio::test]
    async fn flat_frame_reports_low_contrast_accessibility() {
        let engine = MediaPerceptionEngine::new(PerceptionConfig::default());
        let frame = encode_frame(400, 400, Rgb([128, 128, 128]));

        let analysis = engine.analyze(&frame, MediaType::Screenshot).await;
        assert_eq!(analysis.accessibility_issues.len(), 1);
        assert_eq!(analysis.accessibility_level, AccessibilityLevel::Good);
    }
}
