pub mod classify;
pub mod compose;
pub mod extract;
pub mod geometry;
pub mod pipeline;
pub mod result;
pub mod segment;

pub use classify::{CandidateClassifier, Predicate, Thresholds};
pub use compose::{Composition, ResultCompositor};
pub use extract::{CandidateExtractor, RawContour};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, PipelineProfile};
pub use result::{BoundingBox, Candidate, DetectionResult, Features, Landmark, LandmarkColor};
pub use segment::{ColorSpaceSegmenter, CueThresholds, HsvRange, SegmentationStages};
