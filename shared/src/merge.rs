//! Merge engine for applying partial updates to a full game state
//!
//! The field policy is fixed:
//! - objects in the patch recurse into the matching base object
//! - sequences in the patch replace the base sequence wholesale
//! - absent keys (and `null`) leave the base untouched
//! - any other value overwrites the base value
//!
//! Sequences are never merged index-wise. A penalty list that shrinks or is
//! reordered must arrive exactly as sent, with no stale trailing entries.

use crate::error::SyncError;
use crate::state::{GameState, PartialState};
use serde_json::{Map, Value};

/// Merges `patch` into `base` and returns the result as a new value
///
/// Neither argument is modified.
pub fn merge(base: &GameState, patch: &PartialState) -> Result<GameState, SyncError> {
    if patch.is_empty() {
        return Ok(base.clone());
    }
    let merged = merge_object(&base.to_value()?, patch.as_map());
    GameState::from_value(merged)
}

/// Untyped merge used by [`merge`]
pub fn merge_value(base: &Value, patch: &Value) -> Value {
    match patch {
        Value::Object(fields) => merge_object(base, fields),
        Value::Null => base.clone(),
        other => other.clone(),
    }
}

fn merge_object(base: &Value, patch: &Map<String, Value>) -> Value {
    let mut result = match base {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };

    for (key, patch_value) in patch {
        match patch_value {
            Value::Null => {}
            Value::Object(_) => {
                let base_value = result.get(key).cloned().unwrap_or(Value::Null);
                result.insert(key.clone(), merge_value(&base_value, patch_value));
            }
            _ => {
                result.insert(key.clone(), patch_value.clone());
            }
        }
    }

    Value::Object(result)
}
