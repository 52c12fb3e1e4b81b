//! Classifier artifact loading.
//!
//! An artifact is a directory holding `artifact.json` (the manifest) and, for
//! ONNX models, the model file it names. The manifest carries everything fixed
//! at training time: feature order, onion type encoding, class label order,
//! scaler statistics, and the model itself or a pointer to it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use preservion_core::FEATURE_ORDER;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ArtifactError;
use crate::classifier::{CentroidModel, Classifier, ClassifierAdapter};
use crate::encoder::{CategoryEncoding, FeatureEncoder, StandardScaler};
use crate::labels::LabelEncoding;

pub const MANIFEST_FILE: &str = "artifact.json";

fn default_temperature() -> f32 {
    1.0
}

/// Model section of the manifest, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Centroids keyed by class label, in encoded (scaled) feature space.
    Centroid {
        centroids: HashMap<String, Vec<f32>>,
        #[serde(default = "default_temperature")]
        temperature: f32,
    },
    /// ONNX model file relative to the artifact directory.
    Onnx {
        file: PathBuf,
        #[serde(default)]
        input: Option<String>,
    },
}

/// Contents of `artifact.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: String,
    pub feature_order: Vec<String>,
    /// Onion type labels in code order.
    pub onion_types: Vec<String>,
    /// Class labels in model output order.
    pub classes: Vec<String>,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    pub model: ModelSpec,
}

impl ArtifactManifest {
    pub fn check_feature_order(&self) -> Result<(), ArtifactError> {
        let expected: Vec<String> = FEATURE_ORDER.iter().map(|f| f.as_str().to_string()).collect();
        let actual: Vec<String> = self
            .feature_order
            .iter()
            .map(|f| f.trim().to_lowercase())
            .collect();
        if actual != expected {
            return Err(ArtifactError::FeatureOrder { expected, actual });
        }
        Ok(())
    }
}

/// A loaded artifact: encoder and classifier sharing one training snapshot.
pub struct Artifact {
    pub version: String,
    pub encoder: FeatureEncoder,
    pub adapter: ClassifierAdapter,
}

impl Artifact {
    /// Load the artifact stored in `dir`.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(ArtifactError::ManifestNotFound(manifest_path));
        }
        let json = std::fs::read_to_string(&manifest_path)?;
        let manifest: ArtifactManifest = serde_json::from_str(&json)?;
        Self::from_manifest(manifest, dir)
    }

    /// Build from an already-parsed manifest. `dir` resolves relative model files.
    pub fn from_manifest(manifest: ArtifactManifest, dir: &Path) -> Result<Self, ArtifactError> {
        manifest.check_feature_order()?;

        let categories = CategoryEncoding::new(&manifest.onion_types)?;
        if let Some(scaler) = &manifest.scaler {
            scaler.validate()?;
        }
        let labels = LabelEncoding::from_labels(&manifest.classes)?;
        let model = build_model(&manifest, &labels, dir)?;

        let width = FEATURE_ORDER.len();
        if model.n_features() != width {
            return Err(ArtifactError::FeatureOrder {
                expected: FEATURE_ORDER.iter().map(|f| f.as_str().to_string()).collect(),
                actual: vec![format!("{} model inputs", model.n_features())],
            });
        }

        info!(
            version = %manifest.version,
            model = model.kind(),
            features = width,
            classes = labels.len(),
            onion_types = categories.len(),
            normalized = manifest.scaler.is_some(),
            "loaded classifier artifact"
        );

        Ok(Self {
            version: manifest.version,
            encoder: FeatureEncoder::new(categories, manifest.scaler),
            adapter: ClassifierAdapter::new(model, labels),
        })
    }
}

fn build_model(
    manifest: &ArtifactManifest,
    labels: &LabelEncoding,
    dir: &Path,
) -> Result<Box<dyn Classifier>, ArtifactError> {
    match &manifest.model {
        ModelSpec::Centroid {
            centroids,
            temperature,
        } => {
            // Re-key by condition so label spelling in the map does not matter.
            let by_condition: HashMap<_, _> = centroids
                .iter()
                .map(|(label, c)| {
                    preservion_core::Condition::from_label(label)
                        .map(|cond| (cond, c.clone()))
                        .ok_or_else(|| {
                            ArtifactError::Invalid(format!("centroid for unknown class '{label}'"))
                        })
                })
                .collect::<Result<_, _>>()?;

            let ordered = labels
                .classes()
                .iter()
                .map(|cond| {
                    by_condition.get(cond).cloned().ok_or_else(|| {
                        ArtifactError::Invalid(format!("no centroid for class '{cond}'"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Box::new(CentroidModel::new(ordered, *temperature)?))
        }
        #[cfg(feature = "onnx")]
        ModelSpec::Onnx { file, input } => {
            let model = crate::onnx::OnnxClassifier::load(
                &dir.join(file),
                input.as_deref(),
                FEATURE_ORDER.len(),
                labels.len(),
            )
            .map_err(|e| ArtifactError::Model(format!("{e:#}")))?;
            Ok(Box::new(model))
        }
        #[cfg(not(feature = "onnx"))]
        ModelSpec::Onnx { .. } => {
            let _ = dir;
            Err(ArtifactError::Unsupported("onnx".into()))
        }
    }
}
