//! Flattened assessment returned to callers.

use serde::Serialize;

use crate::decision::Recommendation;
use crate::reading::{ClassificationResult, Condition, Probabilities};

/// Classification and recommendation merged into one response object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub condition: Condition,
    pub risk_level: u32,
    pub action: String,
    pub recommendations: Vec<String>,
    pub shelf_life: String,
    pub confidence: f32,
    pub probabilities: Probabilities,
}

impl Assessment {
    pub fn new(classification: ClassificationResult, recommendation: Recommendation) -> Self {
        Self {
            condition: classification.predicted,
            risk_level: recommendation.risk_score,
            action: recommendation.action,
            recommendations: recommendation.actions,
            shelf_life: recommendation.shelf_life.to_string(),
            confidence: recommendation.confidence,
            probabilities: classification.probabilities,
        }
    }
}
