//! Class labels of the classifier output.
//!
//! The model emits class indices and a probability row in the order its label
//! encoder was fitted (`classes` in the manifest). This module maps both back
//! to [`Condition`]s.

use std::collections::HashSet;

use preservion_core::{Condition, Probabilities};

use crate::ArtifactError;

/// Index → condition mapping fixed at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoding {
    classes: Vec<Condition>,
}

impl Default for LabelEncoding {
    /// Alphabetical label-encoder order: good, risky, spoiled.
    fn default() -> Self {
        Self {
            classes: Condition::ALL.to_vec(),
        }
    }
}

impl LabelEncoding {
    /// Build from fitted labels. Every label must name a known condition;
    /// a model trained on a subset of conditions is allowed.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, ArtifactError> {
        let mut seen = HashSet::new();
        let mut classes = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref();
            let condition = Condition::from_label(label)
                .ok_or_else(|| ArtifactError::Invalid(format!("unknown class label '{label}'")))?;
            if !seen.insert(condition) {
                return Err(ArtifactError::Invalid(format!(
                    "duplicate class label '{label}'"
                )));
            }
            classes.push(condition);
        }
        if classes.is_empty() {
            return Err(ArtifactError::Invalid("no class labels in artifact".into()));
        }
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[Condition] {
        &self.classes
    }

    pub fn decode(&self, index: usize) -> Option<Condition> {
        self.classes.get(index).copied()
    }

    pub fn index_of(&self, condition: Condition) -> Option<usize> {
        self.classes.iter().position(|&c| c == condition)
    }

    /// Spread a model probability row over all conditions. Conditions the
    /// model was not trained on get 0.0.
    pub fn probabilities(&self, row: &[f32]) -> Probabilities {
        let mut out = Probabilities::default();
        for (&condition, &p) in self.classes.iter().zip(row) {
            *out.get_mut(condition) = p;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_alphabetical() {
        let labels = LabelEncoding::default();
        assert_eq!(labels.decode(0), Some(Condition::Good));
        assert_eq!(labels.decode(2), Some(Condition::Spoiled));
        assert_eq!(labels.decode(3), None);
    }

    #[test]
    fn custom_order_is_respected() {
        let labels = LabelEncoding::from_labels(&["spoiled", "good", "risky"]).unwrap();
        assert_eq!(labels.decode(0), Some(Condition::Spoiled));
        assert_eq!(labels.index_of(Condition::Risky), Some(2));

        let p = labels.probabilities(&[0.7, 0.1, 0.2]);
        assert_eq!(p.spoiled, 0.7);
        assert_eq!(p.good, 0.1);
        assert_eq!(p.risky, 0.2);
    }

    #[test]
    fn missing_class_defaults_to_zero() {
        let labels = LabelEncoding::from_labels(&["good", "spoiled"]).unwrap();
        let p = labels.probabilities(&[0.4, 0.6]);
        assert_eq!(p.good, 0.4);
        assert_eq!(p.risky, 0.0);
        assert_eq!(p.spoiled, 0.6);
    }

    #[test]
    fn rejects_unknown_and_duplicate_labels() {
        assert!(LabelEncoding::from_labels(&["good", "mouldy"]).is_err());
        assert!(LabelEncoding::from_labels(&["good", "Good"]).is_err());
        assert!(LabelEncoding::from_labels::<&str>(&[]).is_err());
    }
}
