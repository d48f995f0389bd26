//! Stateless merging of several scouts' observations into one record.

use serde_json::{Map, Value};

const SCHEMA_VERSION_FIELD: &str = "schema_version";
const NOTES_FIELD: &str = "notes";
const NOTES_SEPARATOR: &str = " | ";

/// Strict majority of `true`; ties and empty input resolve to `false`.
pub fn majority_vote(values: &[bool]) -> bool {
    let yes = values.iter().filter(|v| **v).count();
    yes * 2 > values.len()
}

/// Weighted mean of the present values. Missing weights count as 1.0 and an
/// input with no present values (or no total weight) averages to 0.
pub fn weighted_average(values: &[Option<f64>], weights: Option<&[f64]>) -> f64 {
    let (sum, total_weight) = values
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| value.map(|v| (v, weight_at(weights, idx))))
        .fold((0.0, 0.0), |(sum, total), (value, weight)| {
            (sum + value * weight, total + weight)
        });

    if total_weight == 0.0 {
        0.0
    } else {
        sum / total_weight
    }
}

/// Most frequent value; the first-seen value wins ties.
pub fn mode<T: PartialEq + Clone>(values: &[T]) -> Option<T> {
    let mut counts: Vec<(&T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&T, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone())
}

/// Merges observation payloads field by field: booleans by majority vote,
/// numbers by weighted average rounded to an integer, strings by mode and
/// nested objects recursively. `schema_version` is taken from the first
/// observation and `notes` are concatenated.
pub fn consolidate_performance_data(observations: &[Value], weights: Option<&[f64]>) -> Value {
    match observations {
        [] => Value::Object(Map::new()),
        [single] => single.clone(),
        _ => {
            let entries: Vec<(&Value, f64)> = observations
                .iter()
                .enumerate()
                .map(|(idx, obs)| (obs, weight_at(weights, idx)))
                .collect();
            Value::Object(consolidate_objects(&entries, true))
        }
    }
}

fn weight_at(weights: Option<&[f64]>, idx: usize) -> f64 {
    weights.and_then(|w| w.get(idx)).copied().unwrap_or(1.0)
}

fn consolidate_objects(entries: &[(&Value, f64)], top_level: bool) -> Map<String, Value> {
    let mut keys: Vec<&String> = Vec::new();
    for (value, _) in entries {
        if let Some(object) = value.as_object() {
            for key in object.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }

    let mut consolidated = Map::new();
    for key in keys {
        let present: Vec<(&Value, f64)> = entries
            .iter()
            .filter_map(|(value, weight)| value.get(key.as_str()).map(|v| (v, *weight)))
            .collect();

        let merged = if top_level && key == SCHEMA_VERSION_FIELD {
            present
                .first()
                .map(|(value, _)| (*value).clone())
                .unwrap_or(Value::Null)
        } else if key == NOTES_FIELD {
            concatenate_notes(&present)
        } else {
            consolidate_field(&present)
        };

        consolidated.insert(key.clone(), merged);
    }
    consolidated
}

fn concatenate_notes(present: &[(&Value, f64)]) -> Value {
    let notes: Vec<&str> = present
        .iter()
        .filter_map(|(value, _)| value.as_str())
        .map(str::trim)
        .filter(|note| !note.is_empty())
        .collect();

    if notes.is_empty() {
        Value::Null
    } else {
        Value::String(notes.join(NOTES_SEPARATOR))
    }
}

fn consolidate_field(present: &[(&Value, f64)]) -> Value {
    let non_null: Vec<(&Value, f64)> = present
        .iter()
        .filter(|(value, _)| !value.is_null())
        .copied()
        .collect();

    let Some((first, _)) = non_null.first() else {
        return Value::Null;
    };

    match first {
        Value::Bool(_) => {
            let votes: Vec<bool> = non_null.iter().filter_map(|(v, _)| v.as_bool()).collect();
            Value::Bool(majority_vote(&votes))
        }
        Value::Number(_) => {
            let (values, weights): (Vec<Option<f64>>, Vec<f64>) = non_null
                .iter()
                .filter(|(v, _)| v.is_number())
                .map(|(v, w)| (v.as_f64(), *w))
                .unzip();
            let average = weighted_average(&values, Some(&weights));
            Value::from(average.round() as i64)
        }
        Value::Object(_) => {
            let objects: Vec<(&Value, f64)> = non_null
                .iter()
                .filter(|(v, _)| v.is_object())
                .copied()
                .collect();
            Value::Object(consolidate_objects(&objects, false))
        }
        _ => {
            let values: Vec<Value> = non_null.iter().map(|(v, _)| (*v).clone()).collect();
            mode(&values).unwrap_or(Value::Null)
        }
    }
}
