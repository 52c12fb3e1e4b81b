use preservion_core::PipelineError;
use thiserror::Error;

/// Failure to load or validate a classifier artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact manifest not found: {0}")]
    ManifestNotFound(std::path::PathBuf),

    #[error("reading artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing artifact manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("feature order {actual:?} does not match {expected:?}")]
    FeatureOrder {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("invalid artifact: {0}")]
    Invalid(String),

    #[error("model kind '{0}' requires the `onnx` feature")]
    Unsupported(String),

    #[error("loading model: {0}")]
    Model(String),
}

impl From<ArtifactError> for PipelineError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::FeatureOrder { expected, actual } => PipelineError::EncodingMismatch {
                expected: expected.join(","),
                actual: actual.join(","),
            },
            other => PipelineError::ModelUnavailable(other.to_string()),
        }
    }
}
