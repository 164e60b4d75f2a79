//! Helpers for reading attributes out of fetched rows.
//!
//! Rows are plain maps from camel-cased attribute name to JSON value. Batch
//! providers receive parallel column sets produced by [`get_by_name`] and are
//! expected to answer with row-parallel output; [`sort_as_values`] does the
//! realignment for the common "fetch children, match them back by key" case.

use crate::model::Row;
use indexmap::IndexMap;
use serde_json::Value;

/// Reads one attribute from a row, accepting any spelling of the name.
pub fn get(row: &Row, name: &str) -> Value {
    row.get(&crate::naming::camel_case(name))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Extracts one attribute from every row, padding missing values with null so
/// the output stays parallel to the input.
pub fn get_from_list(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter().map(|row| get(row, name)).collect()
}

/// Extracts the named attributes from every row as parallel columns. This is
/// the shape handed to batch providers.
pub fn get_by_name(rows: &[Row], names: &[String]) -> IndexMap<String, Vec<Value>> {
    names
        .iter()
        .map(|name| (name.clone(), get_from_list(rows, name)))
        .collect()
}

/// Removes duplicates and nulls, preserving first-seen order.
pub fn compact(values: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if value.is_null() || out.contains(value) {
            continue;
        }
        out.push(value.clone());
    }
    out
}

/// Orders `rows` to run parallel with `keys`, matching each key against the
/// `key_field` attribute. Keys with no matching row (or null keys) keep their
/// position and yield `default`, so the result is always `keys.len()` long.
/// With `project` set, only that attribute of the matched row is returned.
pub fn sort_as_values(
    rows: &[Row],
    keys: &[Value],
    default: Value,
    key_field: &str,
    project: Option<&str>,
) -> Vec<Value> {
    keys.iter()
        .map(|key| {
            if key.is_null() {
                return default.clone();
            }
            let matched = rows.iter().find(|row| loose_eq(&get(row, key_field), key));
            match (matched, project) {
                (Some(row), Some(field)) => get(row, field),
                (Some(row), None) => Value::Object(row.clone().into_iter().collect()),
                (None, _) => default.clone(),
            }
        })
        .collect()
}

/// Values compare equal when identical, or when their canonical string forms
/// agree. Keys arrive from JSON while rows come from column decoding, so a
/// numeric id may be a number on one side and a string on the other.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    a == b || canonical(a) == canonical(b)
}

fn canonical(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
