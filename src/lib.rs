//! Firewatch Kernel
//!
//! Fire detection on still frames, with debounced alerting.
//!
//! # Architecture
//!
//! Every frame runs through a stateless pipeline:
//!
//! 1. **Segmentation**: blur, then AND together color cues (HSV window,
//!    red-difference chroma, lightness) and close small gaps.
//! 2. **Extraction**: outer contours of the mask, gated by area.
//! 3. **Classification**: shape and texture predicates (solidity, jaggedness,
//!    edge density, entropy, Laplacian variance, red dominance) reject
//!    fire-colored objects that are not flames.
//! 4. **Composition**: confidence score, bounding boxes, overlays and encoded
//!    artifacts.
//!
//! The per-frame verdict then drives an alert state machine that starts the
//! alarm and sends the notification at most once per incident. Side effects
//! are returned as commands and executed by a `CommandDispatcher`.
//!
//! # Module Structure
//!
//! - `frame`: input frames, decoding and size limits
//! - `detect`: the pipeline stages and their result types
//! - `artifact`: artifact encoding
//! - `alert`: state machine and command dispatch
//! - `detector`: `FireDetector`, the public entry point
//! - `config`: file and environment configuration
//! - `synthetic`: synthetic scenes for tests and demos

pub mod alert;
pub mod artifact;
pub mod config;
pub mod detect;
pub mod detector;
pub mod error;
pub mod frame;
pub mod synthetic;

pub use alert::{
    AlertCommand, AlertHandle, AlertPolicy, AlertState, AlertStateMachine, ArmingPolicy,
    CommandDispatcher,
};
pub use artifact::{ArtifactEncoder, ArtifactFormat, EncodedImage, ImageArtifactEncoder};
pub use config::FirewatchConfig;
pub use detect::{DetectionResult, PipelineConfig, PipelineProfile};
pub use detector::{DetectionOutcome, FireDetector};
pub use error::{DetectError, DispatchError};
pub use frame::{Frame, Mask};
