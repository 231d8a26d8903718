//! Error types at the kernel boundary.
//!
//! Only `DetectError` ever reaches a caller of `FireDetector::detect`. Alerting
//! failures are `DispatchError`s and stay inside the dispatcher.

/// Errors surfaced synchronously by the detection path.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    /// The frame could not be decoded, was empty, or had degenerate dimensions.
    /// Hosts map this to a client error.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An annotated or segmented artifact could not be serialized.
    #[error("artifact encoding failed")]
    Artifact(#[source] image::ImageError),
}

impl DetectError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DetectError::InvalidInput(msg.into())
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, DetectError::InvalidInput(_))
    }
}

/// Errors raised while executing an alert command. Never propagated to the
/// detection caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Delivery channel lacks usable configuration (e.g. missing credentials).
    #[error("dispatch configuration error: {0}")]
    Configuration(String),

    /// Audio or network failure during delivery.
    #[error("transient dispatch failure: {0}")]
    Transient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_distinguishable() {
        let err = DetectError::invalid("frame has zero width");
        assert!(err.is_invalid_input());
        assert_eq!(err.to_string(), "invalid input: frame has zero width");
    }
}
