//! Decision engine: turns a predicted condition plus the raw reading into
//! storage guidance.
//!
//! Every threshold, coefficient and directive lives in [`DecisionConfig`], a
//! declarative table that can be loaded from JSON. The engine itself is pure:
//! the same classification and reading always produce the same
//! [`Recommendation`].
//!
//! # Threshold direction
//!
//! Directive rules compare with [`Comparison::AtLeast`] by default, so a risky
//! reading at exactly 18 °C already asks for more airflow. Shelf-life
//! deductions only apply once a value strictly exceeds its threshold.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::reading::{ClassificationResult, Condition, Measurement, PerCondition, SensorReading};

/// Appended when a custom rule table leaves a class without any directive.
pub const GENERIC_DIRECTIVE: &str = "Monitor storage conditions closely";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading decision config {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("parsing decision config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid decision config: {0}")]
    Invalid(String),
}

/// How a reading is compared against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `value > threshold`
    Above,
    /// `value >= threshold`
    AtLeast,
}

impl Comparison {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Above => value > threshold,
            Self::AtLeast => value >= threshold,
        }
    }
}

fn default_comparison() -> Comparison {
    Comparison::AtLeast
}

/// Condition on one sensor channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub field: Measurement,
    pub threshold: f64,
    #[serde(default = "default_comparison")]
    pub comparison: Comparison,
}

impl Trigger {
    pub fn at_least(field: Measurement, threshold: f64) -> Self {
        Self {
            field,
            threshold,
            comparison: Comparison::AtLeast,
        }
    }

    pub fn fires(&self, reading: &SensorReading) -> bool {
        self.comparison
            .holds(reading.measurement(self.field), self.threshold)
    }
}

/// One row of the directive table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveRule {
    pub condition: Condition,
    /// `None` means the directive is always emitted for `condition`.
    #[serde(default)]
    pub when: Option<Trigger>,
    pub directive: String,
}

impl DirectiveRule {
    fn always(condition: Condition, directive: &str) -> Self {
        Self {
            condition,
            when: None,
            directive: directive.to_string(),
        }
    }

    fn when(condition: Condition, trigger: Trigger, directive: &str) -> Self {
        Self {
            condition,
            when: Some(trigger),
            directive: directive.to_string(),
        }
    }
}

/// Days removed from the shelf-life base once `field` exceeds `threshold`:
/// `fixed + per_unit * (value - threshold)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub field: Measurement,
    pub threshold: f64,
    #[serde(default)]
    pub fixed: f64,
    #[serde(default)]
    pub per_unit: f64,
}

impl Deduction {
    fn proportional(field: Measurement, threshold: f64, per_unit: f64) -> Self {
        Self {
            field,
            threshold,
            fixed: 0.0,
            per_unit,
        }
    }

    fn step(field: Measurement, threshold: f64, fixed: f64) -> Self {
        Self {
            field,
            threshold,
            fixed,
            per_unit: 0.0,
        }
    }

    pub fn days_lost(&self, reading: &SensorReading) -> f64 {
        let value = reading.measurement(self.field);
        if value > self.threshold {
            self.fixed + self.per_unit * (value - self.threshold)
        } else {
            0.0
        }
    }
}

/// Shelf-life parameters for one condition.
///
/// `adjusted = floor(base_days - deductions)`, then the range is
/// `[max(adjusted - below, min_low), max(adjusted + above, min_high, low)]`,
/// never below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfLifeProfile {
    pub base_days: f64,
    #[serde(default)]
    pub below: u32,
    #[serde(default)]
    pub above: u32,
    #[serde(default)]
    pub min_low: u32,
    #[serde(default)]
    pub min_high: u32,
    #[serde(default)]
    pub deductions: Vec<Deduction>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Estimated remaining storage time, inclusive day range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShelfLife {
    pub min_days: u32,
    pub max_days: u32,
    pub note: Option<String>,
}

impl fmt::Display for ShelfLife {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{} days", self.min_days, self.max_days)?;
        if let Some(note) = &self.note {
            write!(f, " ({note})")?;
        }
        Ok(())
    }
}

/// Tunable rule table for the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Coarse severity per class; must increase with severity.
    pub risk_scores: PerCondition<u32>,
    /// One-line action summary per class.
    pub headlines: PerCondition<String>,
    /// Evaluated in order; every matching row contributes its directive.
    pub rules: Vec<DirectiveRule>,
    /// Emitted when none of a class's conditional rules fire.
    pub fallbacks: PerCondition<Option<String>>,
    pub shelf_life: PerCondition<ShelfLifeProfile>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        use Condition::{Good, Risky, Spoiled};
        use Measurement::{Co2, Ethylene, Humidity, Temperature};

        Self {
            risk_scores: PerCondition {
                good: 33,
                risky: 66,
                spoiled: 100,
            },
            headlines: PerCondition {
                good: "All conditions optimal. Maintain storage.".into(),
                risky: "Early spoilage risk. Correct storage conditions now.".into(),
                spoiled: "Remove spoiled onions immediately to prevent rot spread.".into(),
            },
            rules: vec![
                DirectiveRule::always(Spoiled, "Remove spoiled onions now"),
                DirectiveRule::always(Spoiled, "Maximize ventilation"),
                DirectiveRule::when(
                    Spoiled,
                    Trigger::at_least(Temperature, 20.0),
                    "Cool down storage",
                ),
                DirectiveRule::when(Spoiled, Trigger::at_least(Humidity, 80.0), "Use dehumidifier"),
                DirectiveRule::when(
                    Spoiled,
                    Trigger::at_least(Ethylene, 5.0),
                    "Activate ethylene scrubber",
                ),
                DirectiveRule::always(Risky, "Risk of spoilage: act now"),
                DirectiveRule::when(
                    Risky,
                    Trigger::at_least(Temperature, 18.0),
                    "Increase airflow",
                ),
                DirectiveRule::when(Risky, Trigger::at_least(Humidity, 75.0), "Wipe moisture"),
                DirectiveRule::when(
                    Risky,
                    Trigger::at_least(Co2, 1200.0),
                    "Open vents 15 min/hour",
                ),
                DirectiveRule::always(Good, "All good, keep current settings"),
                DirectiveRule::always(Good, "Keep in darkness"),
            ],
            fallbacks: PerCondition {
                good: None,
                risky: Some("Monitor closely for early signs of spoilage".into()),
                spoiled: None,
            },
            shelf_life: PerCondition {
                good: ShelfLifeProfile {
                    base_days: 60.0,
                    below: 0,
                    above: 5,
                    min_low: 0,
                    min_high: 0,
                    deductions: vec![
                        Deduction::proportional(Temperature, 14.0, 3.0),
                        Deduction::proportional(Humidity, 65.0, 2.0),
                        Deduction::proportional(Ethylene, 1.0, 5.0),
                    ],
                    note: None,
                },
                risky: ShelfLifeProfile {
                    base_days: 15.0,
                    below: 3,
                    above: 0,
                    min_low: 2,
                    min_high: 1,
                    deductions: vec![
                        Deduction::step(Temperature, 16.0, 3.0),
                        Deduction::step(Humidity, 75.0, 4.0),
                        Deduction::step(Ethylene, 2.5, 5.0),
                    ],
                    note: None,
                },
                spoiled: ShelfLifeProfile {
                    base_days: 0.0,
                    below: 0,
                    above: 2,
                    min_low: 0,
                    min_high: 0,
                    deductions: vec![],
                    note: Some("urgent action needed".into()),
                },
            },
        }
    }
}

impl DecisionConfig {
    /// Parse a JSON rule table. Sections left out keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        info!(
            path = %path.display(),
            rules = config.rules.len(),
            "loaded decision config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scores = &self.risk_scores;
        if !(scores.good < scores.risky && scores.risky < scores.spoiled) {
            return Err(ConfigError::Invalid(format!(
                "risk scores must increase with severity, got good={} risky={} spoiled={}",
                scores.good, scores.risky, scores.spoiled
            )));
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.directive.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("rule {i} has an empty directive")));
            }
            if let Some(trigger) = &rule.when
                && !trigger.threshold.is_finite()
            {
                return Err(ConfigError::Invalid(format!(
                    "rule {i} threshold must be finite"
                )));
            }
        }

        for (condition, profile) in self.shelf_life.iter() {
            if !profile.base_days.is_finite() || profile.base_days < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{condition} shelf-life base must be a non-negative number"
                )));
            }
            let bad_deduction = profile.deductions.iter().any(|d| {
                !d.threshold.is_finite()
                    || !d.fixed.is_finite()
                    || !d.per_unit.is_finite()
                    || d.fixed < 0.0
                    || d.per_unit < 0.0
            });
            if bad_deduction {
                return Err(ConfigError::Invalid(format!(
                    "{condition} shelf-life deductions must be finite and non-negative"
                )));
            }
        }

        Ok(())
    }
}

/// Guidance derived from one classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub risk_score: u32,
    pub action: String,
    pub shelf_life: ShelfLife,
    pub actions: Vec<String>,
    pub confidence: f32,
}

/// Pure rule evaluator over a validated [`DecisionConfig`].
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self {
            config: DecisionConfig::default(),
        }
    }
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn risk_score(&self, condition: Condition) -> u32 {
        *self.config.risk_scores.get(condition)
    }

    /// Ordered directives for `condition`. Never empty.
    pub fn directives(&self, condition: Condition, reading: &SensorReading) -> Vec<String> {
        let mut out = Vec::new();
        let mut conditional_fired = false;

        for rule in self.config.rules.iter().filter(|r| r.condition == condition) {
            match &rule.when {
                None => out.push(rule.directive.clone()),
                Some(trigger) if trigger.fires(reading) => {
                    conditional_fired = true;
                    out.push(rule.directive.clone());
                }
                Some(_) => {}
            }
        }

        if !conditional_fired && let Some(fallback) = self.config.fallbacks.get(condition) {
            out.push(fallback.clone());
        }
        if out.is_empty() {
            out.push(GENERIC_DIRECTIVE.to_string());
        }
        out
    }

    pub fn shelf_life(&self, condition: Condition, reading: &SensorReading) -> ShelfLife {
        let profile = self.config.shelf_life.get(condition);
        let lost: f64 = profile.deductions.iter().map(|d| d.days_lost(reading)).sum();
        let adjusted = (profile.base_days - lost).floor();

        let low = (adjusted - f64::from(profile.below))
            .max(f64::from(profile.min_low))
            .max(0.0);
        let high = (adjusted + f64::from(profile.above))
            .max(f64::from(profile.min_high))
            .max(low);

        ShelfLife {
            min_days: low as u32,
            max_days: high as u32,
            note: profile.note.clone(),
        }
    }

    pub fn recommend(
        &self,
        classification: &ClassificationResult,
        reading: &SensorReading,
    ) -> Recommendation {
        let condition = classification.predicted;
        Recommendation {
            risk_score: self.risk_score(condition),
            action: self.config.headlines.get(condition).clone(),
            shelf_life: self.shelf_life(condition, reading),
            actions: self.directives(condition, reading),
            confidence: classification.probabilities.max_value(),
        }
    }
}
