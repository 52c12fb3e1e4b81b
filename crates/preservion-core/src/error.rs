use thiserror::Error;

/// Failure of a single assessment, from request validation through classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Missing field, non-numeric value, or unknown category.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// The classifier artifact is not loaded or can no longer serve.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Encoded vector does not match what the classifier was trained on.
    #[error("feature encoding mismatch: expected {expected}, got {actual}")]
    EncodingMismatch { expected: String, actual: String },

    /// Classifier returned something the adapter cannot interpret.
    #[error("malformed model output: {0}")]
    ModelOutput(String),
}

impl PipelineError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the caller sent bad input; everything else is server-side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}
