//! Inference layer: feature encoding, classifier adapters, and the assessment
//! pipeline. ONNX Runtime models are available behind the `onnx` feature.

pub mod artifact;
pub mod batch;
pub mod classifier;
pub mod encoder;
mod error;
pub mod labels;
#[cfg(feature = "onnx")]
mod onnx;
pub mod pipeline;

pub use artifact::{Artifact, ArtifactManifest, ModelSpec};
pub use classifier::{CentroidModel, Classifier, ClassifierAdapter};
pub use encoder::{CategoryEncoding, FeatureEncoder, StandardScaler};
pub use error::ArtifactError;
pub use labels::LabelEncoding;
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
pub use pipeline::Pipeline;
