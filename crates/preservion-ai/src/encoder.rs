//! Feature encoding: sensor reading → fixed-order numeric vector.
//!
//! The category mapping and scaler statistics are frozen at training time and
//! arrive with the artifact; nothing here is re-fitted per request.

use std::collections::HashMap;

use preservion_core::{FEATURE_ORDER, Feature, PipelineError, SensorReading};
use serde::{Deserialize, Serialize};

use crate::ArtifactError;

/// Fitted label ↔ code mapping for onion types.
///
/// Codes are positions in the fitted class list, so `["large", "red"]` maps
/// `large → 0` and `red → 1`. Labels are stored lowercase.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEncoding {
    labels: Vec<String>,
    codes: HashMap<String, usize>,
}

impl CategoryEncoding {
    pub fn new<I, S>(labels: I) -> Result<Self, ArtifactError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        let mut codes = HashMap::new();
        for label in labels {
            let label = label.as_ref().trim().to_lowercase();
            if label.is_empty() {
                return Err(ArtifactError::Invalid("empty onion type label".into()));
            }
            if codes.insert(label.clone(), out.len()).is_some() {
                return Err(ArtifactError::Invalid(format!(
                    "duplicate onion type label '{label}'"
                )));
            }
            out.push(label);
        }
        if out.is_empty() {
            return Err(ArtifactError::Invalid("no onion types in artifact".into()));
        }
        Ok(Self { labels: out, codes })
    }

    /// Code for `label`, matched case-insensitively. Unknown labels are an input error.
    pub fn encode(&self, label: &str) -> Result<usize, PipelineError> {
        let key = label.trim().to_lowercase();
        self.codes.get(&key).copied().ok_or_else(|| {
            PipelineError::invalid(
                Feature::OnionType.as_str(),
                format!(
                    "unknown onion type '{}', expected one of: {}",
                    label.trim(),
                    self.labels.join(", ")
                ),
            )
        })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Standard-score normalizer: `(x - mean) / scale` per slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self, ArtifactError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        let width = FEATURE_ORDER.len();
        if self.mean.len() != width || self.scale.len() != width {
            return Err(ArtifactError::Invalid(format!(
                "scaler needs {width} means and scales, got {} and {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(ArtifactError::Invalid("scaler statistics must be finite".into()));
        }
        Ok(())
    }

    pub fn transform(&self, features: &mut [f32]) {
        for ((x, &mean), &scale) in features.iter_mut().zip(&self.mean).zip(&self.scale) {
            // Constant columns were fitted with scale 0; sklearn treats them as 1.
            let scale = if scale == 0.0 { 1.0 } else { scale };
            *x = (*x - mean) / scale;
        }
    }
}

/// Encodes readings in [`FEATURE_ORDER`].
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    categories: CategoryEncoding,
    scaler: Option<StandardScaler>,
}

impl FeatureEncoder {
    pub fn new(categories: CategoryEncoding, scaler: Option<StandardScaler>) -> Self {
        Self { categories, scaler }
    }

    pub fn categories(&self) -> &CategoryEncoding {
        &self.categories
    }

    pub fn is_normalized(&self) -> bool {
        self.scaler.is_some()
    }

    /// Width of every encoded vector.
    pub fn width(&self) -> usize {
        FEATURE_ORDER.len()
    }

    pub fn encode(&self, reading: &SensorReading) -> Result<Vec<f32>, PipelineError> {
        reading.validate()?;
        let code = self.categories.encode(&reading.onion_type)?;

        let mut features = Vec::with_capacity(FEATURE_ORDER.len());
        for feature in FEATURE_ORDER {
            let raw = match feature {
                Feature::Temperature => reading.temperature as f32,
                Feature::Humidity => reading.humidity as f32,
                Feature::Ethylene => reading.ethylene as f32,
                Feature::Co2 => reading.co2 as f32,
                Feature::OnionType => code as f32,
            };
            // Finite f64 values can still overflow f32.
            if !raw.is_finite() {
                return Err(PipelineError::invalid(feature.as_str(), "value out of range"));
            }
            features.push(raw);
        }

        if let Some(scaler) = &self.scaler {
            scaler.transform(&mut features);
            if let Some((feature, _)) = FEATURE_ORDER
                .iter()
                .zip(&features)
                .find(|(_, x)| !x.is_finite())
            {
                return Err(PipelineError::invalid(feature.as_str(), "value out of range"));
            }
        }
        Ok(features)
    }
}
