//! Resource type declarations shared by the entity stores and the API registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::database::record::Record;
use crate::filter::Filter;
use crate::types::Method;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read resource declarations from {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("Invalid resource declarations: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid identifier '{name}' in resource '{resource}'")]
    InvalidIdentifier { resource: String, name: String },

    #[error("Relation '{relation}' on '{resource}' targets undeclared type '{target}'")]
    UnknownTarget { resource: String, relation: String, target: String },
}

/// How a relation is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationDef {
    /// Foreign key `<relation>_id` on this type points at the target's primary key
    BelongsTo { target: String },
    /// Target rows carry `foreign_key` pointing back at this type's primary key
    HasMany { target: String, foreign_key: String },
}

impl RelationDef {
    pub fn target(&self) -> &str {
        match self {
            RelationDef::BelongsTo { target } | RelationDef::HasMany { target, .. } => target,
        }
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_guarded() -> Vec<String> {
    vec!["created_at".to_string(), "updated_at".to_string()]
}

/// Declaration of a single resource type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Filled from the map key when loading
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub error_scope: u32,
    #[serde(default = "default_guarded")]
    pub guarded: Vec<String>,
    #[serde(default)]
    pub methods: Option<Vec<Method>>,
    /// Relations eligible for `?include=` and relation URLs
    #[serde(default)]
    pub exposed: Vec<String>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationDef>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            primary_key: default_primary_key(),
            page_size: None,
            error_scope: 0,
            guarded: default_guarded(),
            methods: None,
            exposed: vec![],
            relations: BTreeMap::new(),
        }
    }

    pub fn belongs_to(mut self, relation: &str, target: &str) -> Self {
        self.relations.insert(relation.to_string(), RelationDef::BelongsTo { target: target.to_string() });
        self
    }

    pub fn has_many(mut self, relation: &str, target: &str, foreign_key: &str) -> Self {
        self.relations.insert(
            relation.to_string(),
            RelationDef::HasMany { target: target.to_string(), foreign_key: foreign_key.to_string() },
        );
        self
    }

    pub fn expose(mut self, relations: &[&str]) -> Self {
        self.exposed = relations.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub fn new_record(&self) -> Record {
        Record::new(&self.name, &self.primary_key, self.exposed.clone())
    }

    pub fn record_from_row(&self, row: serde_json::Map<String, serde_json::Value>) -> Record {
        Record::from_row(&self.name, &self.primary_key, self.exposed.clone(), row)
    }
}

#[derive(Debug, Deserialize)]
struct ResourceFile {
    #[serde(default)]
    resources: BTreeMap<String, TypeSchema>,
}

/// All declared resource types, keyed by type name
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, TypeSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, mut schema: TypeSchema) -> Self {
        if schema.name.is_empty() {
            schema.name = schema.table_name().to_string();
        }
        self.types.insert(schema.name.clone(), schema);
        self
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, SchemaError> {
        let file: ResourceFile = serde_yaml::from_str(source)?;
        let mut schema = Self::new();
        for (name, mut type_schema) in file.resources {
            type_schema.name = name;
            schema.types.insert(type_schema.name.clone(), type_schema);
        }
        schema.validate()?;
        Ok(schema)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|source| SchemaError::Io { path: path.display().to_string(), source })?;
        let schema = Self::from_yaml_str(&source)?;
        tracing::info!("Loaded {} resource declarations from {}", schema.types.len(), path.display());
        Ok(schema)
    }

    /// Identifiers end up quoted in SQL and relation targets must resolve.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (name, type_schema) in &self.types {
            let identifiers = [type_schema.table_name(), type_schema.primary_key.as_str()];
            for identifier in identifiers {
                if Filter::validate_identifier(identifier).is_err() {
                    return Err(SchemaError::InvalidIdentifier { resource: name.clone(), name: identifier.to_string() });
                }
            }
            for (relation, def) in &type_schema.relations {
                if !self.types.contains_key(def.target()) {
                    return Err(SchemaError::UnknownTarget {
                        resource: name.clone(),
                        relation: relation.clone(),
                        target: def.target().to_string(),
                    });
                }
                if let RelationDef::HasMany { foreign_key, .. } = def {
                    if Filter::validate_identifier(foreign_key).is_err() {
                        return Err(SchemaError::InvalidIdentifier { resource: name.clone(), name: foreign_key.clone() });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeSchema> {
        self.types.values()
    }
}
