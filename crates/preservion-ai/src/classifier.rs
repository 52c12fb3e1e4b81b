//! Classifier seam and the adapter that turns raw model output into a
//! [`ClassificationResult`].
//!
//! Any model family plugs in through [`Classifier`]: the bundled
//! [`CentroidModel`], the ONNX Runtime backend, or a stub in tests. The
//! [`ClassifierAdapter`] owns every check between the encoder and the decision
//! engine (vector width, readiness, output sanity), so models stay thin.

use preservion_core::{ClassificationResult, PipelineError};
use tracing::warn;

use crate::ArtifactError;
use crate::labels::LabelEncoding;

/// Probability rows whose sum is further than this from 1 are renormalized.
pub const PROBABILITY_TOLERANCE: f32 = 1e-3;

/// Pre-trained classifier over encoded feature vectors.
///
/// Implementations are shared read-only across concurrent requests.
pub trait Classifier: Send + Sync {
    /// Short model family name for logs and health output.
    fn kind(&self) -> &'static str;

    /// Width of the feature vector the model was trained on.
    fn n_features(&self) -> usize;

    /// Raw class index (position in the fitted label order).
    fn predict(&self, features: &[f32]) -> Result<usize, PipelineError>;

    /// One probability per fitted class, in label order.
    fn predict_probabilities(&self, features: &[f32]) -> Result<Vec<f32>, PipelineError>;

    /// Class index and probability row from a single evaluation. Backends
    /// that produce both at once should override this.
    fn predict_with_probabilities(
        &self,
        features: &[f32],
    ) -> Result<(usize, Vec<f32>), PipelineError> {
        Ok((self.predict(features)?, self.predict_probabilities(features)?))
    }

    /// False once the model can no longer serve (e.g. a poisoned session).
    fn is_ready(&self) -> bool {
        true
    }
}

/// Wraps a [`Classifier`] with its fitted label mapping.
pub struct ClassifierAdapter {
    model: Box<dyn Classifier>,
    labels: LabelEncoding,
}

impl ClassifierAdapter {
    pub fn new(model: Box<dyn Classifier>, labels: LabelEncoding) -> Self {
        Self { model, labels }
    }

    pub fn labels(&self) -> &LabelEncoding {
        &self.labels
    }

    pub fn kind(&self) -> &'static str {
        self.model.kind()
    }

    pub fn n_features(&self) -> usize {
        self.model.n_features()
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_ready()
    }

    pub fn classify(&self, features: &[f32]) -> Result<ClassificationResult, PipelineError> {
        if !self.model.is_ready() {
            return Err(PipelineError::ModelUnavailable(format!(
                "{} classifier is not ready",
                self.model.kind()
            )));
        }

        let expected = self.model.n_features();
        if features.len() != expected {
            return Err(PipelineError::EncodingMismatch {
                expected: format!("{expected} features"),
                actual: format!("{} features", features.len()),
            });
        }

        let (index, row) = self.model.predict_with_probabilities(features)?;
        let predicted = self.labels.decode(index).ok_or_else(|| {
            PipelineError::ModelOutput(format!(
                "class index {index} outside {} fitted labels",
                self.labels.len()
            ))
        })?;

        let row = self.checked_row(row)?;

        Ok(ClassificationResult {
            predicted,
            probabilities: self.labels.probabilities(&row),
        })
    }

    fn checked_row(&self, mut row: Vec<f32>) -> Result<Vec<f32>, PipelineError> {
        if row.len() != self.labels.len() {
            return Err(PipelineError::ModelOutput(format!(
                "expected {} probabilities, got {}",
                self.labels.len(),
                row.len()
            )));
        }
        if row.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(PipelineError::ModelOutput(format!(
                "probabilities must be finite and non-negative, got {row:?}"
            )));
        }

        let sum: f32 = row.iter().sum();
        if sum <= 0.0 {
            return Err(PipelineError::ModelOutput("probabilities sum to zero".into()));
        }
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            warn!(sum, "renormalizing classifier probabilities");
            for p in &mut row {
                *p /= sum;
            }
        }
        for p in &mut row {
            *p = p.min(1.0);
        }
        Ok(row)
    }
}

/// Nearest-centroid classifier in encoded feature space.
///
/// Holds one centroid per fitted class. The predicted class is the nearest
/// centroid by Euclidean distance; probabilities are a softmax over
/// `-distance² / temperature`.
#[derive(Debug, Clone)]
pub struct CentroidModel {
    centroids: Vec<Vec<f32>>,
    temperature: f32,
    dim: usize,
}

impl CentroidModel {
    /// `centroids` must be in fitted label order, all of the same width.
    pub fn new(centroids: Vec<Vec<f32>>, temperature: f32) -> Result<Self, ArtifactError> {
        let dim = centroids
            .first()
            .map(Vec::len)
            .ok_or_else(|| ArtifactError::Invalid("centroid model has no centroids".into()))?;
        if dim == 0 || centroids.iter().any(|c| c.len() != dim) {
            return Err(ArtifactError::Invalid("centroids must share one non-zero width".into()));
        }
        if centroids.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ArtifactError::Invalid("centroids must be finite".into()));
        }
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ArtifactError::Invalid(format!(
                "softmax temperature must be positive, got {temperature}"
            )));
        }
        Ok(Self {
            centroids,
            temperature,
            dim,
        })
    }

    /// Squared distance to each centroid minus the squared distance to the
    /// first one, in f64. Expanding the difference avoids squaring the
    /// features, so huge but finite readings keep their ordering.
    fn offsets(&self, features: &[f32]) -> Vec<f64> {
        let anchor = &self.centroids[0];
        self.centroids
            .iter()
            .map(|c| {
                c.iter()
                    .zip(anchor)
                    .zip(features)
                    .map(|((&ci, &ai), &x)| {
                        let (ci, ai, x) = (f64::from(ci), f64::from(ai), f64::from(x));
                        (ci - ai) * (ci + ai - 2.0 * x)
                    })
                    .sum()
            })
            .collect()
    }

    fn nearest(offsets: &[f64]) -> usize {
        let mut best = 0;
        for (i, d) in offsets.iter().enumerate() {
            if *d < offsets[best] {
                best = i;
            }
        }
        best
    }

    fn probabilities(&self, offsets: &[f64]) -> Vec<f32> {
        let t = f64::from(self.temperature);
        let logits: Vec<f64> = offsets.iter().map(|d| -d / t).collect();
        softmax(&logits)
    }
}

impl Classifier for CentroidModel {
    fn kind(&self) -> &'static str {
        "centroid"
    }

    fn n_features(&self) -> usize {
        self.dim
    }

    fn predict(&self, features: &[f32]) -> Result<usize, PipelineError> {
        Ok(Self::nearest(&self.offsets(features)))
    }

    fn predict_probabilities(&self, features: &[f32]) -> Result<Vec<f32>, PipelineError> {
        Ok(self.probabilities(&self.offsets(features)))
    }

    fn predict_with_probabilities(
        &self,
        features: &[f32],
    ) -> Result<(usize, Vec<f32>), PipelineError> {
        let offsets = self.offsets(features);
        Ok((Self::nearest(&offsets), self.probabilities(&offsets)))
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| (e / sum) as f32).collect()
}
