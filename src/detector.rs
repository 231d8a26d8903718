//! Public entry point tying the pipeline to the alert state machine.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use crate::alert::{AlertCommand, AlertPolicy, AlertState, CommandDispatcher};
use crate::artifact::{ArtifactEncoder, ImageArtifactEncoder};
use crate::detect::pipeline::{Pipeline, PipelineConfig};
use crate::detect::result::{Candidate, DetectionResult};
use crate::error::DetectError;
use crate::frame::Frame;

pub use crate::alert::AlertHandle;

/// Everything one `detect` call produced.
#[derive(Clone, Debug)]
pub struct DetectionOutcome {
    pub result: DetectionResult,
    pub candidates: Vec<Candidate>,
    /// Commands the caller is expected to execute.
    pub commands: Vec<AlertCommand>,
}

/// Fire detector. Shareable across threads; only alert state is mutable and it
/// sits behind a single lock.
pub struct FireDetector {
    pipeline: Pipeline,
    encoder: Arc<dyn ArtifactEncoder>,
    alerts: AlertHandle,
}

impl FireDetector {
    pub fn new(config: PipelineConfig, policy: AlertPolicy) -> Result<Self> {
        Ok(Self {
            pipeline: Pipeline::new(config)?,
            encoder: Arc::new(ImageArtifactEncoder::default()),
            alerts: AlertHandle::new(policy),
        })
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ArtifactEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline on one frame and advance the alert state.
    ///
    /// Alert state changes only after the frame has been fully processed, so
    /// a failing frame leaves it untouched.
    pub fn detect(&self, frame: &Frame) -> Result<DetectionOutcome, DetectError> {
        let output = self.pipeline.run(frame)?;
        let result = output.to_result(self.encoder.as_ref(), unix_now())?;
        let commands = self.alerts.observe(result.detected);
        if !commands.is_empty() {
            log::info!(
                "fire detected (confidence {:.1}%): {:?}",
                result.confidence,
                commands
            );
        }
        Ok(DetectionOutcome {
            result,
            candidates: output.candidates,
            commands,
        })
    }

    pub fn detect_encoded(&self, bytes: &[u8]) -> Result<DetectionOutcome, DetectError> {
        self.detect(&Frame::decode(bytes)?)
    }

    /// Accepts plain base64 or a `data:image/...;base64,` URL.
    pub fn detect_base64(&self, payload: &str) -> Result<DetectionOutcome, DetectError> {
        self.detect(&Frame::decode_base64(payload)?)
    }

    /// `detect`, then hand every command to `dispatcher`.
    pub fn detect_and_dispatch(
        &self,
        frame: &Frame,
        dispatcher: &dyn CommandDispatcher,
    ) -> Result<DetectionResult, DetectError> {
        let outcome = self.detect(frame)?;
        for command in outcome.commands {
            dispatcher.dispatch(command);
        }
        Ok(outcome.result)
    }

    pub fn reset_alerts(&self) -> Vec<AlertCommand> {
        let commands = self.alerts.reset();
        log::info!("alert state reset");
        commands
    }

    pub fn reset_and_dispatch(&self, dispatcher: &dyn CommandDispatcher) {
        for command in self.reset_alerts() {
            dispatcher.dispatch(command);
        }
    }

    pub fn alert_state(&self) -> AlertState {
        self.alerts.state()
    }

    /// Handle for dispatchers that report delivery failures back.
    pub fn alert_handle(&self) -> AlertHandle {
        self.alerts.clone()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingDispatcher;
    use crate::artifact::EncodedImage;
    use image::{ImageError, RgbImage};

    struct FailingEncoder;

    impl ArtifactEncoder for FailingEncoder {
        fn encode(&self, _image: &RgbImage) -> Result<EncodedImage, ImageError> {
            Err(ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    fn detector() -> FireDetector {
        FireDetector::new(PipelineConfig::strict(), AlertPolicy::default()).unwrap()
    }

    #[test]
    fn undecodable_bytes_are_invalid_input() {
        let err = detector().detect_encoded(b"not an image").unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn encoder_failure_is_reported() {
        let d = detector().with_encoder(Arc::new(FailingEncoder));
        let frame = Frame::from_image(RgbImage::new(16, 16)).unwrap();
        assert!(matches!(d.detect(&frame), Err(DetectError::Artifact(_))));
        assert_eq!(d.alert_state(), AlertState::default());
    }

    #[test]
    fn quiet_frame_dispatches_nothing() {
        let d = detector();
        let rec = RecordingDispatcher::new();
        let frame = Frame::from_image(RgbImage::new(32, 32)).unwrap();
        let result = d.detect_and_dispatch(&frame, &rec).unwrap();
        assert!(!result.detected);
        assert!(rec.commands().is_empty());
        d.reset_and_dispatch(&rec);
        assert!(rec.commands().is_empty());
    }

    #[test]
    fn timestamp_is_wall_clock_seconds() {
        let frame = Frame::from_image(RgbImage::new(8, 8)).unwrap();
        let before = unix_now();
        let outcome = detector().detect(&frame).unwrap();
        assert!(outcome.result.timestamp >= before);
    }
}
