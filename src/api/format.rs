use serde_json::{json, Map, Value};

use crate::database::{Record, Related};

/// Serialize a record into a JSON:API resource object.
///
/// `{ id, type, ...attributes, links: { <relation>: { linkage } } }`
///
/// The primary key and `hidden` attributes are left out. A loaded to-one
/// relation supersedes its `<relation>_id` foreign key, which is suppressed
/// here rather than on the record so serialization never mutates it.
pub fn resource_object(record: &Record, hidden: &[String]) -> Value {
    let superseded: Vec<String> = record
        .relations()
        .iter()
        .filter(|(_, related)| related.is_to_one())
        .map(|(name, _)| format!("{}_id", name))
        .collect();

    let mut obj = Map::new();
    for (key, value) in record.attributes() {
        if key == record.primary_key_name() || hidden.contains(key) || superseded.contains(key) {
            continue;
        }
        obj.insert(key.clone(), value.clone());
    }

    if let Some(id) = record.id_string() {
        obj.insert("id".into(), Value::String(id));
    }
    obj.insert("type".into(), Value::String(record.type_name().to_string()));

    if !record.relations().is_empty() {
        let links: Map<String, Value> = record
            .relations()
            .iter()
            .map(|(name, related)| (name.clone(), json!({ "linkage": linkage(related) })))
            .collect();
        obj.insert("links".into(), Value::Object(links));
    }

    Value::Object(obj)
}

fn identifier(record: &Record) -> Value {
    json!({ "id": record.id_string(), "type": record.type_name() })
}

fn linkage(related: &Related) -> Value {
    match related {
        Related::One(Some(record)) => identifier(record),
        Related::One(None) => Value::Null,
        Related::Many(records) => Value::Array(records.iter().map(identifier).collect()),
    }
}
