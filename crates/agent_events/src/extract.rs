//! Field lookups over decoded JSON. Missing or mistyped fields fall back to defaults
//! instead of failing, matching how agents omit fields between versions.

use serde_json::{Map, Value};

pub(crate) fn lookup<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = root.get(*first)?;
    for key in rest {
        current = current.get(*key)?;
    }
    Some(current)
}

/// Present and not JSON `null`.
pub(crate) fn present_at<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    lookup(root, path).filter(|value| !value.is_null())
}

pub(crate) fn str_at<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a str> {
    lookup(root, path).and_then(Value::as_str)
}

pub(crate) fn string_at(root: &Map<String, Value>, path: &[&str]) -> String {
    str_at(root, path).unwrap_or_default().to_string()
}

pub(crate) fn non_empty_string_at(root: &Map<String, Value>, path: &[&str]) -> Option<String> {
    str_at(root, path)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// First non-empty string among several candidate paths.
pub(crate) fn first_string_at(root: &Map<String, Value>, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| non_empty_string_at(root, path))
}

pub(crate) fn object_at(root: &Map<String, Value>, path: &[&str]) -> Map<String, Value> {
    lookup(root, path)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn array_at(root: &Map<String, Value>, path: &[&str]) -> Vec<Value> {
    lookup(root, path)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Token counts: non-negative integers, floats truncated, anything else zero.
pub(crate) fn count_at(root: &Map<String, Value>, path: &[&str]) -> u64 {
    lookup(root, path).map(as_count).unwrap_or(0)
}

fn as_count(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|n| n.is_finite() && *n > 0.0)
                .map(|n| n as u64)
        })
        .unwrap_or(0)
}

pub(crate) fn i64_at(root: &Map<String, Value>, path: &[&str]) -> Option<i64> {
    lookup(root, path).and_then(Value::as_i64)
}

pub(crate) fn f64_at(root: &Map<String, Value>, path: &[&str]) -> Option<f64> {
    lookup(root, path).and_then(Value::as_f64)
}

pub(crate) fn bool_at(root: &Map<String, Value>, path: &[&str]) -> bool {
    lookup(root, path)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Strings pass through; anything else becomes compact JSON text.
pub(crate) fn text_or_json(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
