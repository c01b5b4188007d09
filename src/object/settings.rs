//! Settings normalization, diffing and payload assembly

use crate::semp::Backend;
use serde_json::{Map, Number, Value};

/// Coerce caller-supplied settings into the types the backend expects.
///
/// The broker wants real numbers, so numeric strings become integers
/// (`"100"`) or floats (`"1.5"`), recursively. The cloud API wants strings,
/// so top-level numbers and booleans are stringified.
pub fn normalize_settings(settings: &Map<String, Value>, backend: Backend) -> Map<String, Value> {
    settings
        .iter()
        .map(|(k, v)| {
            let converted = match backend {
                Backend::Broker => to_broker_type(v),
                Backend::Cloud => to_cloud_type(v),
            };
            (k.clone(), converted)
        })
        .collect()
}

fn to_broker_type(value: &Value) -> Value {
    match value {
        Value::String(s) if is_integer(s) => s
            .parse::<u64>()
            .map(|n| Value::Number(Number::from(n)))
            .unwrap_or_else(|_| value.clone()),
        Value::String(s) if is_short_decimal(s) => s
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_broker_type(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn to_cloud_type(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => other.clone(),
    }
}

/// `^[0-9]+$`
fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `^[0-9]+\.[0-9]$`
fn is_short_decimal(s: &str) -> bool {
    match s.split_once('.') {
        Some((whole, frac)) => is_integer(whole) && frac.len() == 1 && is_integer(frac),
        None => false,
    }
}

/// Fields of `desired` whose value differs from `actual`.
///
/// Only keys present in `desired` are compared; nested objects are compared
/// key by key and only their differing members are reported. Top-level keys
/// listed in `ignore` are never reported.
pub fn diff_settings(
    desired: &Map<String, Value>,
    actual: &Map<String, Value>,
    ignore: &[String],
) -> Map<String, Value> {
    let mut changes = Map::new();
    for (key, wanted) in desired {
        if ignore.iter().any(|f| f == key) {
            continue;
        }
        if let Some(delta) = diff_value(wanted, actual.get(key)) {
            changes.insert(key.clone(), delta);
        }
    }
    changes
}

fn diff_value(wanted: &Value, current: Option<&Value>) -> Option<Value> {
    match (wanted, current) {
        (Value::Object(wanted_map), Some(Value::Object(current_map))) => {
            let nested = diff_settings(wanted_map, current_map, &[]);
            (!nested.is_empty()).then_some(Value::Object(nested))
        }
        (Value::Object(_), _) => Some(wanted.clone()),
        (_, current) => {
            let current = current.unwrap_or(&Value::Null);
            (wanted != current).then(|| wanted.clone())
        }
    }
}

/// Extend an update delta with the partners of any required-together
/// field it contains, taking their values from `desired`.
pub fn with_required_together(
    mut delta: Map<String, Value>,
    desired: &Map<String, Value>,
    groups: &[Vec<String>],
) -> Map<String, Value> {
    for group in groups {
        if !group.iter().any(|f| delta.contains_key(f)) {
            continue;
        }
        for field in group {
            if let Some(value) = desired.get(field) {
                delta.entry(field.clone()).or_insert_with(|| value.clone());
            }
        }
    }
    delta
}

/// defaults ∪ settings ∪ mandatory, later layers winning
pub fn merge_payload(
    defaults: &Map<String, Value>,
    settings: &Map<String, Value>,
    mandatory: &Map<String, Value>,
) -> Map<String, Value> {
    let mut payload = defaults.clone();
    for layer in [settings, mandatory] {
        for (k, v) in layer {
            payload.insert(k.clone(), v.clone());
        }
    }
    payload
}
