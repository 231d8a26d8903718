//! Configurable detection pipeline.
//!
//! One code path serves both detection profiles; the profile only chooses the
//! active cues, the classifier predicates and the scoring constants.
//!
//! - `Strict`: three color cues, closing, all six classifier predicates.
//! - `Basic`: single HSV cue on a heavily blurred frame, area gate only.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactEncoder;
use crate::detect::classify::{CandidateClassifier, Predicate, Thresholds};
use crate::detect::compose::{Composition, ResultCompositor};
use crate::detect::extract::{CandidateExtractor, MAX_AREA, MIN_AREA};
use crate::detect::result::{Candidate, DetectionResult};
use crate::detect::segment::{count_nonzero, ColorSpaceSegmenter, CueThresholds, HsvRange};
use crate::error::DetectError;
use crate::frame::Frame;

pub const STRICT_CONFIDENCE_SCALE: f64 = 10_000.0;
pub const BASIC_CONFIDENCE_SCALE: f64 = 15_000.0;
const BASIC_MIN_AREA: f64 = 500.0;
const BASIC_ANNOTATE_MIN_MASK_PIXELS: u32 = 300;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineProfile {
    Basic,
    #[default]
    Strict,
}

impl PipelineProfile {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(PipelineProfile::Basic),
            "strict" => Some(PipelineProfile::Strict),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Resize every frame to this size before processing.
    pub working_size: Option<(u32, u32)>,
    pub cues: CueThresholds,
    pub min_area: f64,
    pub max_area: f64,
    /// Classifier predicates, evaluated in this order.
    pub predicates: Vec<Predicate>,
    pub thresholds: Thresholds,
    /// Mask pixel count that maps to 100% confidence.
    pub confidence_scale: f64,
    /// Candidates holding fewer mask pixels are reported but not drawn.
    pub annotate_min_mask_pixels: u32,
}

impl PipelineConfig {
    pub fn strict() -> Self {
        Self {
            working_size: None,
            cues: CueThresholds::default(),
            min_area: MIN_AREA,
            max_area: MAX_AREA,
            predicates: Predicate::ALL.to_vec(),
            thresholds: Thresholds::default(),
            confidence_scale: STRICT_CONFIDENCE_SCALE,
            annotate_min_mask_pixels: 0,
        }
    }

    pub fn basic() -> Self {
        Self {
            working_size: None,
            cues: CueThresholds {
                blur_kernel: 21,
                hsv: HsvRange {
                    lower: [10, 150, 150],
                    upper: [35, 255, 255],
                },
                chroma_min: None,
                lightness_min: None,
                closing_kernel: 0,
            },
            min_area: BASIC_MIN_AREA,
            max_area: MAX_AREA,
            predicates: Vec::new(),
            thresholds: Thresholds::default(),
            confidence_scale: BASIC_CONFIDENCE_SCALE,
            annotate_min_mask_pixels: BASIC_ANNOTATE_MIN_MASK_PIXELS,
        }
    }

    pub fn for_profile(profile: PipelineProfile) -> Self {
        match profile {
            PipelineProfile::Basic => Self::basic(),
            PipelineProfile::Strict => Self::strict(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_scale.is_finite() && self.confidence_scale > 0.0) {
            return Err(anyhow!("confidence_scale must be a positive number"));
        }
        if !(self.min_area >= 0.0 && self.min_area <= self.max_area) {
            return Err(anyhow!(
                "area gate is empty: min_area {} > max_area {}",
                self.min_area,
                self.max_area
            ));
        }
        if self.cues.blur_kernel == 0 || self.cues.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur_kernel must be odd and positive, got {}",
                self.cues.blur_kernel
            ));
        }
        if self.cues.closing_kernel > 1 && self.cues.closing_kernel % 2 == 0 {
            return Err(anyhow!(
                "closing_kernel must be odd (or 0 to disable), got {}",
                self.cues.closing_kernel
            ));
        }
        let hsv = &self.cues.hsv;
        if (0..3).any(|i| hsv.lower[i] > hsv.upper[i]) {
            return Err(anyhow!("hsv lower bound exceeds upper bound"));
        }
        if self.thresholds.canny_low > self.thresholds.canny_high {
            return Err(anyhow!("canny_low must not exceed canny_high"));
        }
        if let Some((w, h)) = self.working_size {
            if w == 0 || h == 0 {
                return Err(anyhow!("working_size must be non-zero, got {}x{}", w, h));
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::strict()
    }
}

/// Everything one frame produced, before artifact encoding.
#[derive(Debug)]
pub struct PipelineOutput {
    pub red_pixel_count: u32,
    pub candidates: Vec<Candidate>,
    pub composition: Composition,
}

impl PipelineOutput {
    pub fn detected(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// Encode the artifacts and assemble the caller-facing result.
    pub fn to_result(
        &self,
        encoder: &dyn ArtifactEncoder,
        timestamp: u64,
    ) -> Result<DetectionResult, DetectError> {
        let c = &self.composition;
        Ok(DetectionResult {
            detected: self.detected(),
            confidence: c.confidence,
            red_pixel_count: self.red_pixel_count,
            locations: c.locations.clone(),
            landmarks: c.landmarks.clone(),
            segmented_image: encoder.encode(&c.segmented).map_err(DetectError::Artifact)?,
            annotated_image: encoder.encode(&c.annotated).map_err(DetectError::Artifact)?,
            timestamp,
        })
    }
}

/// Stateless segmentation → extraction → classification → composition.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    segmenter: ColorSpaceSegmenter,
    extractor: CandidateExtractor,
    classifier: CandidateClassifier,
    compositor: ResultCompositor,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segmenter: ColorSpaceSegmenter::new(config.cues.clone()),
            extractor: CandidateExtractor::new(config.min_area, config.max_area),
            classifier: CandidateClassifier::new(
                config.thresholds.clone(),
                config.predicates.clone(),
            ),
            compositor: ResultCompositor::new(
                config.confidence_scale,
                config.annotate_min_mask_pixels,
            ),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn segmenter(&self) -> &ColorSpaceSegmenter {
        &self.segmenter
    }

    /// Bring a frame to the configured working size.
    pub fn prepare(&self, frame: &Frame) -> Result<Frame, DetectError> {
        match self.config.working_size {
            Some((w, h)) => frame.resized(w, h),
            None => Ok(frame.clone()),
        }
    }

    pub fn run(&self, frame: &Frame) -> Result<PipelineOutput, DetectError> {
        let frame = self.prepare(frame)?;
        let mask = self.segmenter.segment(&frame);
        let red_pixel_count = count_nonzero(&mask);

        let contours = self.extractor.extract(&mask);
        let candidates: Vec<Candidate> = contours
            .iter()
            .filter_map(|c| self.classifier.classify(&frame, &mask, c))
            .collect();
        log::debug!(
            "frame {}x{}: {} mask pixels, {} contours, {} candidates",
            frame.width(),
            frame.height(),
            red_pixel_count,
            contours.len(),
            candidates.len()
        );

        let composition = self
            .compositor
            .compose(&frame, &mask, red_pixel_count, &candidates);
        Ok(PipelineOutput {
            red_pixel_count,
            candidates,
            composition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn profiles_differ_only_in_configuration() {
        let basic = PipelineConfig::basic();
        assert!(basic.predicates.is_empty());
        assert_eq!(basic.cues.chroma_min, None);
        assert_eq!(basic.confidence_scale, BASIC_CONFIDENCE_SCALE);
        let strict = PipelineConfig::for_profile(PipelineProfile::Strict);
        assert_eq!(strict.predicates, Predicate::ALL.to_vec());
        assert_eq!(strict, PipelineConfig::default());
        assert!(basic.validate().is_ok());
        assert!(strict.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = PipelineConfig::strict();
        cfg.confidence_scale = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::strict();
        cfg.cues.blur_kernel = 6;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::strict();
        cfg.min_area = 10.0;
        cfg.max_area = 5.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::strict();
        cfg.working_size = Some((0, 540));
        assert!(Pipeline::new(cfg).is_err());
    }

    #[test]
    fn black_frame_produces_nothing() {
        let pipeline = Pipeline::new(PipelineConfig::strict()).unwrap();
        let frame = Frame::from_image(RgbImage::from_pixel(64, 48, Rgb([0, 0, 0]))).unwrap();
        let out = pipeline.run(&frame).unwrap();
        assert_eq!(out.red_pixel_count, 0);
        assert!(!out.detected());
        assert_eq!(out.composition.confidence, 0.0);
        assert!(out.composition.locations.is_empty());
    }

    #[test]
    fn working_size_applies_before_segmentation() {
        let mut cfg = PipelineConfig::strict();
        cfg.working_size = Some((32, 24));
        let pipeline = Pipeline::new(cfg).unwrap();
        let frame = Frame::from_image(RgbImage::new(64, 48)).unwrap();
        let out = pipeline.run(&frame).unwrap();
        assert_eq!(out.composition.annotated.dimensions(), (32, 24));
    }

    #[test]
    fn profile_names_parse() {
        assert_eq!(PipelineProfile::parse("Basic"), Some(PipelineProfile::Basic));
        assert_eq!(PipelineProfile::parse(" strict "), Some(PipelineProfile::Strict));
        assert_eq!(PipelineProfile::parse("paranoid"), None);
    }
}
