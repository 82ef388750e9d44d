use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Identity of a record across types, used to de-duplicate compound documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub type_name: String,
    pub id: String,
}

/// Canonical text form of a key or filter value: strings verbatim, everything else as JSON.
pub fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Records reached through one relation of another record
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// to-one; `None` when the foreign key is empty or dangling
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Related {
    pub fn records(&self) -> Vec<&Record> {
        match self {
            Related::One(Some(record)) => vec![record.as_ref()],
            Related::One(None) => vec![],
            Related::Many(records) => records.iter().collect(),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Related::One(Some(record)) => vec![*record],
            Related::One(None) => vec![],
            Related::Many(records) => records,
        }
    }

    pub fn is_to_one(&self) -> bool {
        matches!(self, Related::One(_))
    }
}

/// A row of some resource type as handed out by an entity store.
///
/// The store fills in the type name, primary-key column and the exposed
/// relation names from the type's declaration. Loaded relations are a
/// per-response cache populated by the pipeline before serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    primary_key: String,
    fields: Map<String, Value>,
    exposed: Vec<String>,
    relations: BTreeMap<String, Related>,
    persisted: bool,
}

impl Record {
    /// Create a new, unsaved record
    pub fn new(type_name: impl Into<String>, primary_key: impl Into<String>, exposed: Vec<String>) -> Self {
        Self {
            type_name: type_name.into(),
            primary_key: primary_key.into(),
            fields: Map::new(),
            exposed,
            relations: BTreeMap::new(),
            persisted: false,
        }
    }

    /// Wrap a row that already exists in the store
    pub fn from_row(
        type_name: impl Into<String>,
        primary_key: impl Into<String>,
        exposed: Vec<String>,
        fields: Map<String, Value>,
    ) -> Self {
        let mut record = Self::new(type_name, primary_key, exposed);
        record.fields = fields;
        record.persisted = true;
        record
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    pub fn id(&self) -> Option<&Value> {
        self.fields.get(&self.primary_key).filter(|v| !v.is_null())
    }

    pub fn id_string(&self) -> Option<String> {
        self.id().map(id_to_string)
    }

    pub fn key(&self) -> Option<RecordKey> {
        self.id_string().map(|id| RecordKey { type_name: self.type_name.clone(), id })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Assign attributes from a write body, skipping guarded ones.
    /// Returns the names that were skipped.
    pub fn fill(&mut self, attributes: Map<String, Value>, guarded: &[String]) -> Vec<String> {
        let mut skipped = Vec::new();
        for (key, value) in attributes {
            if guarded.iter().any(|g| g == &key) {
                tracing::warn!("Ignoring guarded attribute '{}' on {}", key, self.type_name);
                skipped.push(key);
                continue;
            }
            self.fields.insert(key, value);
        }
        skipped
    }

    pub fn exposed_relations(&self) -> &[String] {
        &self.exposed
    }

    pub fn exposes(&self, relation: &str) -> bool {
        self.exposed.iter().any(|r| r == relation)
    }

    pub fn relations(&self) -> &BTreeMap<String, Related> {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn set_relation(&mut self, name: impl Into<String>, related: Related) -> &mut Self {
        self.relations.insert(name.into(), related);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Replace field values with what the store wrote and mark the record saved
    pub fn mark_persisted(&mut self, fields: Map<String, Value>) -> &mut Self {
        self.fields = fields;
        self.persisted = true;
        self
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(type: {}, id: {:?}, fields: {}, persisted: {})",
            self.type_name,
            self.id_string(),
            self.fields.len(),
            self.persisted
        )
    }
}
