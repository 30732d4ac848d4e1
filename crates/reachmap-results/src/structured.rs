//! Structured (nested JSON) output encoding.

use crate::{EncodeError, UnifiedResults};
use serde_json::{json, Value};

/// Encode the unified results as a nested JSON document: one entry per area
/// with its id, name, and ordered per-origin records. Empty areas appear
/// with an empty `results` array.
pub fn to_json(unified: &UnifiedResults) -> Result<Value, EncodeError> {
    let entries = unified
        .areas
        .iter()
        .map(|area| {
            Ok(json!({
                "id": area.area_id,
                "name": area.area_name,
                "results": serde_json::to_value(&area.records)?,
            }))
        })
        .collect::<Result<Vec<Value>, serde_json::Error>>()?;
    Ok(Value::Array(entries))
}
