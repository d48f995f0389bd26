use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use super::models::ValidationOutcome;
use crate::elo::EloCalculator;

/// Fields that describe the payload rather than the robot
const IGNORED_FIELDS: [&str; 2] = ["schema_version", "notes"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSettings {
    /// Minimum accuracy for an overall exact match
    pub exact_threshold: f64,
    /// Minimum accuracy for an overall close match
    pub close_threshold: f64,
    /// Relative tolerance for a numeric close match
    pub numeric_tolerance_ratio: f64,
    /// Absolute tolerance floor for a numeric close match
    pub numeric_tolerance_floor: f64,
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            exact_threshold: 0.95,
            close_threshold: 0.7,
            numeric_tolerance_ratio: 0.1,
            numeric_tolerance_floor: 1.0,
        }
    }
}

impl ComparisonSettings {
    pub fn outcome_for_accuracy(&self, accuracy: f64) -> ValidationOutcome {
        if accuracy >= self.exact_threshold {
            ValidationOutcome::ExactMatch
        } else if accuracy >= self.close_threshold {
            ValidationOutcome::CloseMatch
        } else {
            ValidationOutcome::Mismatch
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub path: String,
    pub expected: Value,
    pub observed: Value,
    pub outcome: ValidationOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationComparison {
    pub outcome: ValidationOutcome,
    pub accuracy_score: f64,
    pub fields: Vec<FieldComparison>,
}

impl ObservationComparison {
    /// Builds a comparison from already-judged fields; `None` when nothing was compared
    pub fn from_fields(fields: Vec<FieldComparison>, settings: &ComparisonSettings) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }

        let accuracy_score = fields
            .iter()
            .map(|f| EloCalculator::outcome_to_accuracy_score(f.outcome))
            .sum::<f64>()
            / fields.len() as f64;

        Some(Self {
            outcome: settings.outcome_for_accuracy(accuracy_score),
            accuracy_score,
            fields,
        })
    }

    pub fn details(&self) -> Value {
        json!({
            "fields_compared": self.fields.len(),
            "fields": self.fields,
        })
    }
}

/// Compares every non-null leaf of `truth` that the observation also reports.
pub fn compare_observation(
    observation: &Value,
    truth: &Value,
    settings: &ComparisonSettings,
) -> Option<ObservationComparison> {
    let mut truth_leaves = Vec::new();
    flatten(truth, "", &mut truth_leaves);

    let mut observed_leaves = Vec::new();
    flatten(observation, "", &mut observed_leaves);
    let observed: HashMap<String, &Value> = observed_leaves.into_iter().collect();

    let fields = truth_leaves
        .into_iter()
        .filter(|(_, expected)| !expected.is_null())
        .filter_map(|(path, expected)| {
            let actual = observed.get(&path).filter(|v| !v.is_null())?;
            Some(FieldComparison {
                outcome: compare_values(expected, actual, settings),
                expected: expected.clone(),
                observed: (*actual).clone(),
                path,
            })
        })
        .collect();

    ObservationComparison::from_fields(fields, settings)
}

/// Judges one observed value against its expected value
pub fn compare_values(expected: &Value, actual: &Value, settings: &ComparisonSettings) -> ValidationOutcome {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => {
            let (e, a) = (e.as_f64().unwrap_or_default(), a.as_f64().unwrap_or_default());
            let diff = (e - a).abs();
            let tolerance = (e.abs() * settings.numeric_tolerance_ratio)
                .max(settings.numeric_tolerance_floor);
            if diff < f64::EPSILON {
                ValidationOutcome::ExactMatch
            } else if diff <= tolerance {
                ValidationOutcome::CloseMatch
            } else {
                ValidationOutcome::Mismatch
            }
        }
        (Value::String(e), Value::String(a)) if e.eq_ignore_ascii_case(a) => {
            ValidationOutcome::ExactMatch
        }
        (e, a) if e == a => ValidationOutcome::ExactMatch,
        _ => ValidationOutcome::Mismatch,
    }
}

fn flatten<'a>(value: &'a Value, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    match value.as_object() {
        Some(object) => {
            for (key, child) in object {
                if IGNORED_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(child, &path, out);
            }
        }
        None if !prefix.is_empty() => out.push((prefix.to_string(), value)),
        None => {}
    }
}
