//! Assessment pipeline: encode → classify → decide.

use std::path::Path;

use preservion_core::{
    Assessment, ClassificationResult, Condition, DecisionEngine, PipelineError, SensorReading,
};
use tracing::debug;

use crate::artifact::Artifact;
use crate::classifier::ClassifierAdapter;
use crate::encoder::FeatureEncoder;

/// Immutable, shareable assessment pipeline. Build once at startup and share
/// behind an `Arc`; every call is independent.
pub struct Pipeline {
    version: String,
    encoder: FeatureEncoder,
    adapter: ClassifierAdapter,
    engine: DecisionEngine,
}

impl Pipeline {
    pub fn new(
        version: impl Into<String>,
        encoder: FeatureEncoder,
        adapter: ClassifierAdapter,
        engine: DecisionEngine,
    ) -> Result<Self, PipelineError> {
        if encoder.width() != adapter.n_features() {
            return Err(PipelineError::EncodingMismatch {
                expected: format!("{} features", adapter.n_features()),
                actual: format!("{} features", encoder.width()),
            });
        }
        Ok(Self {
            version: version.into(),
            encoder,
            adapter,
            engine,
        })
    }

    pub fn from_artifact(
        artifact: Artifact,
        engine: DecisionEngine,
    ) -> Result<Self, PipelineError> {
        Self::new(artifact.version, artifact.encoder, artifact.adapter, engine)
    }

    /// Load the artifact in `dir`. Any failure surfaces as `ModelUnavailable`
    /// (or `EncodingMismatch` for a feature-order conflict).
    pub fn load(dir: &Path, engine: DecisionEngine) -> Result<Self, PipelineError> {
        let artifact = Artifact::load(dir)?;
        Self::from_artifact(artifact, engine)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn model_kind(&self) -> &'static str {
        self.adapter.kind()
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.is_ready()
    }

    pub fn onion_types(&self) -> &[String] {
        self.encoder.categories().labels()
    }

    pub fn classes(&self) -> &[Condition] {
        self.adapter.labels().classes()
    }

    pub fn classify(&self, reading: &SensorReading) -> Result<ClassificationResult, PipelineError> {
        let features = self.encoder.encode(reading)?;
        self.adapter.classify(&features)
    }

    pub fn assess(&self, reading: &SensorReading) -> Result<Assessment, PipelineError> {
        let classification = self.classify(reading)?;
        let recommendation = self.engine.recommend(&classification, reading);
        debug!(
            condition = %classification.predicted,
            confidence = recommendation.confidence,
            directives = recommendation.actions.len(),
            "assessed reading"
        );
        Ok(Assessment::new(classification, recommendation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::encoder::CategoryEncoding;
    use crate::labels::LabelEncoding;
    use std::path::PathBuf;

    /// Always predicts one class with fixed probabilities.
    struct Fixed {
        index: usize,
        row: [f32; 3],
    }

    impl Classifier for Fixed {
        fn kind(&self) -> &'static str {
            "fixed"
        }
        fn n_features(&self) -> usize {
            5
        }
        fn predict(&self, _: &[f32]) -> Result<usize, PipelineError> {
            Ok(self.index)
        }
        fn predict_probabilities(&self, _: &[f32]) -> Result<Vec<f32>, PipelineError> {
            Ok(self.row.to_vec())
        }
    }

    fn pipeline(index: usize, row: [f32; 3]) -> Pipeline {
        let categories = CategoryEncoding::new(["large", "red", "small", "white"]).unwrap();
        Pipeline::new(
            "test",
            FeatureEncoder::new(categories, None),
            ClassifierAdapter::new(Box::new(Fixed { index, row }), LabelEncoding::default()),
            DecisionEngine::default(),
        )
        .unwrap()
    }

    fn reading(
        temperature: f64,
        humidity: f64,
        ethylene: f64,
        co2: f64,
        onion_type: &str,
    ) -> SensorReading {
        SensorReading {
            temperature,
            humidity,
            ethylene,
            co2,
            onion_type: onion_type.into(),
        }
    }

    #[test]
    fn risky_scenario() {
        let p = pipeline(1, [0.1, 0.75, 0.15]);
        let a = p.assess(&reading(18.0, 80.0, 3.2, 620.0, "red")).unwrap();

        assert_eq!(a.condition, Condition::Risky);
        assert_eq!(a.confidence, 0.75);
        assert_eq!(a.risk_level, 66);
        assert!(a.recommendations.contains(&"Increase airflow".to_string()));
        assert!(a.recommendations.contains(&"Wipe moisture".to_string()));
        assert_eq!(a.shelf_life, "2–3 days");
    }

    #[test]
    fn spoiled_scenario_has_five_directives() {
        let p = pipeline(2, [0.05, 0.15, 0.8]);
        let a = p.assess(&reading(25.0, 85.0, 6.0, 700.0, "white")).unwrap();
        assert_eq!(a.recommendations.len(), 5);
        assert_eq!(a.recommendations[0], "Remove spoiled onions now");
        assert_eq!(a.recommendations[4], "Activate ethylene scrubber");
    }

    #[test]
    fn unknown_onion_type_never_reaches_classifier() {
        let p = pipeline(0, [1.0, 0.0, 0.0]);
        let err = p.assess(&reading(10.0, 60.0, 0.5, 500.0, "blue")).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn identical_input_identical_output() {
        let p = pipeline(1, [0.2, 0.5, 0.3]);
        let r = reading(14.0, 70.0, 1.0, 800.0, "Small");
        assert_eq!(p.assess(&r).unwrap(), p.assess(&r).unwrap());
    }

    #[test]
    fn risk_level_monotone_across_classes() {
        let r = reading(18.0, 80.0, 3.2, 620.0, "red");
        let levels: Vec<u32> = (0..3)
            .map(|i| {
                let mut row = [0.0; 3];
                row[i] = 1.0;
                pipeline(i, row).assess(&r).unwrap().risk_level
            })
            .collect();
        assert!(levels.windows(2).all(|w| w[0] < w[1]), "{levels:?}");
    }

    #[test]
    fn demo_artifact_end_to_end() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("onion-centroid");
        let p = Pipeline::load(&dir, DecisionEngine::default()).unwrap();
        assert!(p.is_ready());
        assert_eq!(p.model_kind(), "centroid");

        let a = p.assess(&reading(18.0, 80.0, 3.2, 620.0, "red")).unwrap();
        assert_eq!(a.condition, Condition::Risky);
        let p_sum = a.probabilities.sum();
        assert!((p_sum - 1.0).abs() < 1e-4, "sum = {p_sum}");
        for (_, v) in a.probabilities.iter() {
            assert!((0.0..=1.0).contains(v));
        }
        assert_eq!(a.confidence, a.probabilities.max_value());
    }

    #[test]
    fn demo_artifact_separates_extremes() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/onion-centroid");
        let p = Pipeline::load(&dir, DecisionEngine::default()).unwrap();

        let cool = p.assess(&reading(8.0, 62.0, 0.4, 450.0, "large")).unwrap();
        assert_eq!(cool.condition, Condition::Good);

        let hot = p.assess(&reading(28.0, 95.0, 8.0, 1900.0, "white")).unwrap();
        assert_eq!(hot.condition, Condition::Spoiled);
    }

    #[test]
    fn demo_artifact_handles_huge_finite_reading() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/onion-centroid");
        let p = Pipeline::load(&dir, DecisionEngine::default()).unwrap();

        let a = p.assess(&reading(18.0, 80.0, 3.2, 1e25, "red")).unwrap();
        assert_eq!(a.condition, Condition::Spoiled);
        assert!(a.probabilities.iter().all(|(_, v)| v.is_finite()));
        assert!((a.probabilities.sum() - 1.0).abs() < 1e-4);
        assert_eq!(a.confidence, a.probabilities.spoiled);
    }

    #[test]
    fn missing_artifact_is_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Pipeline::load(dir.path(), DecisionEngine::default()).err().unwrap();
        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
    }
}
