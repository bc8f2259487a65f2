//! Dot-delimited path addressing into a JSON state tree.
//!
//! Paths like `"settings.taxRate"` walk nested objects. Reads return `None`
//! for any missing intermediate; writes create empty object nodes as needed
//! and never fail for a shape reason.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors for path operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,
}

/// Read the value at `path`, or `None` if any segment is missing.
///
/// Numeric segments index into arrays, so `"tables.0.status"` works against
/// the seed tree.
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = tree;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, creating empty object nodes for missing
/// intermediate segments.
///
/// A scalar sitting where an intermediate object is needed is replaced by an
/// empty object; the only failure mode is an empty path.
pub fn set(tree: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, intermediates) = segments
        .split_last()
        .expect("split on a non-empty path yields at least one segment");

    let mut current = tree;
    for segment in intermediates {
        current = as_object_node(current)
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }
    as_object_node(current).insert(last.to_string(), value);
    Ok(())
}

/// Coerce a node into an object, replacing whatever was there if it wasn't one.
fn as_object_node(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .expect("node was just replaced with an object")
}
