//! Turns a write body into flat attribute maps ready for store assignment.
//!
//! To-one linkage becomes a `<relation>_id` field. To-many linkage is handed
//! back separately and never assigned to the record.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ApiError;

/// Relationship entries that carry links, not linkage
const RESERVED_ENTRIES: [&str; 2] = ["self", "related"];

/// One resource object from a write body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResource {
    pub attributes: Map<String, Value>,
    /// Relation name -> referenced ids
    pub to_many: BTreeMap<String, Vec<Value>>,
}

/// Decode a raw request body
pub fn decode(content: Option<&str>) -> Result<Value, ApiError> {
    let content = content.filter(|c| !c.trim().is_empty()).ok_or_else(|| ApiError::malformed("Request body is empty"))?;
    serde_json::from_str(content).map_err(|e| ApiError::malformed(e.to_string()))
}

/// Parse the `data` member of a decoded body against the expected type.
/// `data` may be a single resource object or an array of them.
pub fn parse(body: &Value, expected_type: &str) -> Result<Vec<ParsedResource>, ApiError> {
    let data = body
        .get("data")
        .ok_or_else(|| ApiError::malformed("Missing \"data\" member"))?;

    match data {
        Value::Array(items) => items.iter().map(|item| parse_resource(item, expected_type)).collect(),
        item => Ok(vec![parse_resource(item, expected_type)?]),
    }
}

fn parse_resource(item: &Value, expected_type: &str) -> Result<ParsedResource, ApiError> {
    let Value::Object(object) = item else {
        return Err(ApiError::malformed("Resource objects must be JSON objects"));
    };

    let given = match object.get("type") {
        None | Some(Value::Null) => return Err(ApiError::MissingTypeParameter),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if given != expected_type {
        return Err(ApiError::TypeMismatch { expected: expected_type.to_string(), given });
    }

    let mut parsed = ParsedResource::default();
    let mut object = object.clone();
    object.remove("type");

    // JSON:API 1.0 nests attributes; flatten them
    if let Some(Value::Object(attributes)) = object.remove("attributes") {
        object.extend(attributes);
    }

    // `links`/`linkage` and the 1.0 `relationships`/`data` spelling
    for (member, linkage_key) in [("links", "linkage"), ("relationships", "data")] {
        let Some(Value::Object(entries)) = object.remove(member) else {
            continue;
        };
        for (relation, entry) in entries {
            if RESERVED_ENTRIES.contains(&relation.as_str()) {
                continue;
            }
            let Some(linkage) = entry.get(linkage_key) else {
                continue;
            };
            match linkage {
                Value::Array(items) => {
                    let ids = items.iter().filter_map(|i| i.get("id").cloned()).collect();
                    parsed.to_many.insert(relation, ids);
                }
                Value::Object(identifier) => {
                    let id = identifier.get("id").cloned().unwrap_or(Value::Null);
                    object.insert(format!("{}_id", relation), id);
                }
                Value::Null => {
                    object.insert(format!("{}_id", relation), Value::Null);
                }
                other => tracing::warn!("Ignoring malformed linkage for '{}': {}", relation, other),
            }
        }
    }

    parsed.attributes = object;
    Ok(parsed)
}
