//! ONNX Runtime backend for exported tabular classifiers.
//!
//! Expects the layout produced by the usual sklearn/XGBoost converters with
//! the zipmap disabled: one float input of shape `[N, features]`, output 0 is
//! the int64 label `[N]` and output 1 the float probabilities `[N, classes]`.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use preservion_core::PipelineError;
use tracing::info;

use crate::classifier::Classifier;

/// Tabular classifier running in ONNX Runtime.
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex;
/// a poisoned mutex marks the model as no longer ready.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    n_features: usize,
    n_classes: usize,
}

impl OnnxClassifier {
    /// Load `model_path`. When `input_name` is `None` the model's first input is used.
    pub fn load(
        model_path: &Path,
        input_name: Option<&str>,
        n_features: usize,
        n_classes: usize,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(model_path.exists(), "{model_path:?} not found");

        let session = Session::builder()?.commit_from_file(model_path)?;

        let input_name = match input_name {
            Some(name) => name.to_string(),
            None => session
                .inputs()
                .first()
                .map(|input| input.name().to_string())
                .ok_or_else(|| anyhow::anyhow!("model declares no inputs"))?,
        };
        anyhow::ensure!(
            session.outputs().len() >= 2,
            "expected label and probability outputs, model has {}",
            session.outputs().len()
        );

        info!(
            model = %model_path.display(),
            input = %input_name,
            n_features,
            n_classes,
            "loaded onnx classifier"
        );
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            n_features,
            n_classes,
        })
    }

    /// Run one row through the model, returning `(label, probabilities)`.
    fn run(&self, features: &[f32]) -> Result<(i64, Vec<f32>), PipelineError> {
        let mut session = self.session.lock().map_err(|_| {
            PipelineError::ModelUnavailable("onnx session poisoned by an earlier panic".into())
        })?;

        let shape = [1i64, features.len() as i64];
        let input = Tensor::from_array((shape, features.to_vec().into_boxed_slice()))
            .map_err(inference_error)?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(inference_error)?;

        let (_, labels) = outputs[0]
            .try_extract_tensor::<i64>()
            .map_err(inference_error)?;
        let label = *labels
            .first()
            .ok_or_else(|| PipelineError::ModelOutput("empty label output".into()))?;

        let (prob_shape, probs) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;
        let dims: &[i64] = prob_shape;
        if dims.last().copied() != Some(self.n_classes as i64) {
            return Err(PipelineError::ModelOutput(format!(
                "unexpected probability shape {dims:?}, expected [1, {}]",
                self.n_classes
            )));
        }

        Ok((label, probs[..self.n_classes].to_vec()))
    }
}

fn inference_error(e: ort::Error) -> PipelineError {
    PipelineError::ModelOutput(format!("onnx inference: {e}"))
}

impl Classifier for OnnxClassifier {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f32]) -> Result<usize, PipelineError> {
        let (label, _) = self.predict_with_probabilities(features)?;
        Ok(label)
    }

    fn predict_probabilities(&self, features: &[f32]) -> Result<Vec<f32>, PipelineError> {
        let (_, probs) = self.run(features)?;
        Ok(probs)
    }

    /// One session run yields both outputs.
    fn predict_with_probabilities(
        &self,
        features: &[f32],
    ) -> Result<(usize, Vec<f32>), PipelineError> {
        let (label, probs) = self.run(features)?;
        let index = usize::try_from(label)
            .map_err(|_| PipelineError::ModelOutput(format!("negative class index {label}")))?;
        Ok((index, probs))
    }

    fn is_ready(&self) -> bool {
        !self.session.is_poisoned()
    }
}
