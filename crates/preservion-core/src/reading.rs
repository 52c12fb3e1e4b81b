//! Sensor readings, storage conditions, and the fixed feature order.
//!
//! The feature order is load-bearing: a classifier artifact is only valid for
//! the exact order it was trained on, so it is declared once here and checked
//! against every artifact manifest at load time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Storage condition predicted by the classifier, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Good,
    Risky,
    Spoiled,
}

impl Condition {
    /// All conditions in ascending severity.
    pub const ALL: [Condition; 3] = [Self::Good, Self::Risky, Self::Spoiled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Risky => "risky",
            Self::Spoiled => "spoiled",
        }
    }

    /// Parse a class label (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per condition. Serializes as `{"good": .., "risky": .., "spoiled": ..}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerCondition<T> {
    pub good: T,
    pub risky: T,
    pub spoiled: T,
}

impl<T> PerCondition<T> {
    pub fn get(&self, condition: Condition) -> &T {
        match condition {
            Condition::Good => &self.good,
            Condition::Risky => &self.risky,
            Condition::Spoiled => &self.spoiled,
        }
    }

    pub fn get_mut(&mut self, condition: Condition) -> &mut T {
        match condition {
            Condition::Good => &mut self.good,
            Condition::Risky => &mut self.risky,
            Condition::Spoiled => &mut self.spoiled,
        }
    }

    /// Iterate `(condition, value)` pairs in severity order.
    pub fn iter(&self) -> impl Iterator<Item = (Condition, &T)> {
        Condition::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Per-class probabilities as returned by the classifier adapter.
pub type Probabilities = PerCondition<f32>;

impl Probabilities {
    /// Highest class probability (the assessment confidence).
    pub fn max_value(&self) -> f32 {
        self.good.max(self.risky).max(self.spoiled)
    }

    pub fn sum(&self) -> f32 {
        self.good + self.risky + self.spoiled
    }
}

/// Classifier output for a single reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub predicted: Condition,
    pub probabilities: Probabilities,
}

/// Numeric sensor channels that decision rules can trigger on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    Temperature,
    Humidity,
    Ethylene,
    Co2,
}

impl Measurement {
    pub const ALL: [Measurement; 4] = [
        Self::Temperature,
        Self::Humidity,
        Self::Ethylene,
        Self::Co2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Ethylene => "ethylene",
            Self::Co2 => "co2",
        }
    }
}

/// One slot of the encoded feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Temperature,
    Humidity,
    Ethylene,
    Co2,
    OnionType,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Ethylene => "ethylene",
            Self::Co2 => "co2",
            Self::OnionType => "onion_type",
        }
    }
}

/// Order of slots in every encoded feature vector.
pub const FEATURE_ORDER: [Feature; 5] = [
    Feature::Temperature,
    Feature::Humidity,
    Feature::Ethylene,
    Feature::Co2,
    Feature::OnionType,
];

/// Raw storage sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Ethylene concentration, ppm.
    pub ethylene: f64,
    /// CO2 concentration, ppm.
    pub co2: f64,
    /// Onion type label as supplied; matched case-insensitively by the encoder.
    pub onion_type: String,
}

impl SensorReading {
    pub fn measurement(&self, m: Measurement) -> f64 {
        match m {
            Measurement::Temperature => self.temperature,
            Measurement::Humidity => self.humidity,
            Measurement::Ethylene => self.ethylene,
            Measurement::Co2 => self.co2,
        }
    }

    /// Check that every numeric channel is finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for m in Measurement::ALL {
            let value = self.measurement(m);
            if !value.is_finite() {
                return Err(PipelineError::invalid(
                    m.as_str(),
                    format!("must be a finite number, got {value}"),
                ));
            }
        }
        if self.onion_type.trim().is_empty() {
            return Err(PipelineError::invalid("onion_type", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> SensorReading {
        SensorReading {
            temperature: 18.0,
            humidity: 80.0,
            ethylene: 3.2,
            co2: 620.0,
            onion_type: "red".into(),
        }
    }

    #[test]
    fn condition_labels_parse_case_insensitively() {
        assert_eq!(Condition::from_label("Risky"), Some(Condition::Risky));
        assert_eq!(Condition::from_label(" SPOILED "), Some(Condition::Spoiled));
        assert_eq!(Condition::from_label("rotten"), None);
    }

    #[test]
    fn condition_order_follows_severity() {
        assert!(Condition::Good < Condition::Risky);
        assert!(Condition::Risky < Condition::Spoiled);
        assert!(Condition::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn probabilities_serialize_with_class_keys() {
        let p = Probabilities {
            good: 0.1,
            risky: 0.75,
            spoiled: 0.15,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["risky"], serde_json::json!(0.75));
        assert_eq!(p.max_value(), 0.75);
        assert!((p.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn feature_order_ends_with_category() {
        assert_eq!(FEATURE_ORDER.len(), 5);
        assert_eq!(FEATURE_ORDER[4], Feature::OnionType);
        let names: Vec<&str> = FEATURE_ORDER.iter().map(|f| f.as_str()).collect();
        assert_eq!(
            names,
            vec!["temperature", "humidity", "ethylene", "co2", "onion_type"]
        );
    }

    #[test]
    fn validate_accepts_finite_reading() {
        assert!(reading().validate().is_ok());
    }

    #[test]
    fn validate_names_non_finite_field() {
        let mut r = reading();
        r.ethylene = f64::NAN;
        let err = r.validate().unwrap_err();
        assert!(
            matches!(&err, PipelineError::InvalidInput { field, .. } if field == "ethylene"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn validate_rejects_blank_onion_type() {
        let mut r = reading();
        r.onion_type = "  ".into();
        assert!(r.validate().is_err());
    }
}
