//! Core types for onion storage assessment: readings, error taxonomy,
//! decision rules, and Arrow schemas.

pub mod assessment;
pub mod decision;
mod error;
pub mod reading;
pub mod schema;

pub use assessment::Assessment;
pub use decision::{ConfigError, DecisionConfig, DecisionEngine, Recommendation, ShelfLife};
pub use error::PipelineError;
pub use reading::{
    ClassificationResult, Condition, FEATURE_ORDER, Feature, Measurement, PerCondition,
    Probabilities, SensorReading,
};
