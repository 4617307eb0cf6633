//! JSON-safe snapshots of arbitrary values.
//!
//! Logging never fails, so a value that cannot be represented as JSON is
//! replaced by an inert marker object instead of raising.

use serde::Serialize;
use serde_json::{Map, Value};

/// Key used by the marker that replaces an unserializable value.
pub const UNSERIALIZABLE_KEY: &str = "$unserializable";

/// Containers nested deeper than this are replaced by a marker.
pub const MAX_SNAPSHOT_DEPTH: usize = 64;

/// Take a deep, JSON-safe copy of `value`.
///
/// **Returns**
/// - The JSON representation of `value`, with containers nested deeper
///   than [`MAX_SNAPSHOT_DEPTH`] collapsed into markers.
/// - A marker object `{"$unserializable": "<reason>"}` if `value` cannot
///   be serialized at all (e.g. a map with non-string keys, or a
///   `Serialize` impl that reports an error).
pub fn snapshot<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => sanitize(v),
        Err(e) => marker(e.to_string()),
    }
}

/// Recursively copy `value`: primitives pass through, objects and arrays
/// recurse, anything nested past the depth limit becomes a marker.
pub fn sanitize(value: Value) -> Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: Value, depth: usize) -> Value {
    match value {
        Value::Object(map) if depth >= MAX_SNAPSHOT_DEPTH && !map.is_empty() => {
            marker("depth limit exceeded")
        }
        Value::Array(items) if depth >= MAX_SNAPSHOT_DEPTH && !items.is_empty() => {
            marker("depth limit exceeded")
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_at(v, depth + 1)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| sanitize_at(v, depth + 1))
                .collect(),
        ),
        other => other,
    }
}

fn marker(reason: impl Into<String>) -> Value {
    let mut map = Map::new();
    map.insert(UNSERIALIZABLE_KEY.to_string(), Value::String(reason.into()));
    Value::Object(map)
}
