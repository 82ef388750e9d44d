use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::database::record::{id_to_string, Record, Related};
use crate::database::schema::{RelationDef, Schema, TypeSchema};
use crate::filter::{FilterError, FilterOrderInfo, FilterWhereInfo, SortDirection};

/// Errors raised by entity stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown resource type: {0}")]
    UnknownType(String),

    #[error("Relation '{relation}' is not defined on {type_name}")]
    RelationNotFound { type_name: String, relation: String },

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Selection criteria against one resource type.
///
/// Built by the filter/sort engine and executed by an [`EntityStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    type_name: String,
    conditions: Vec<FilterWhereInfo>,
    order: Vec<FilterOrderInfo>,
}

impl Query {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), conditions: vec![], order: vec![] }
    }

    pub fn filter_eq(&mut self, column: impl Into<String>, value: Value) -> &mut Self {
        self.conditions.push(FilterWhereInfo::Eq { column: column.into(), value });
        self
    }

    pub fn filter_or_eq(&mut self, column: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.conditions.push(FilterWhereInfo::AnyOf { column: column.into(), values });
        self
    }

    pub fn order_by(&mut self, column: impl Into<String>, sort: SortDirection) -> &mut Self {
        self.order.push(FilterOrderInfo { column: column.into(), sort });
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn conditions(&self) -> &[FilterWhereInfo] {
        &self.conditions
    }

    pub fn order(&self) -> &[FilterOrderInfo] {
        &self.order
    }
}

/// Persistence backend consumed by the request pipeline
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Declarations of every type this store serves
    fn schema(&self) -> &Schema;

    async fn find(&self, type_name: &str, id: &str) -> Result<Option<Record>, StoreError>;

    async fn count(&self, query: &Query) -> Result<u64, StoreError>;

    /// One page of results; `number` starts at 1. Pages past the end are empty.
    async fn page(&self, query: &Query, number: u32, size: u32) -> Result<Vec<Record>, StoreError>;

    async fn all(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Insert or update. `Ok(false)` means the store declined the write.
    async fn save(&self, record: &mut Record) -> Result<bool, StoreError>;

    async fn delete(&self, record: &Record) -> Result<(), StoreError>;

    fn type_schema(&self, type_name: &str) -> Result<&TypeSchema, StoreError> {
        self.schema().get(type_name).ok_or_else(|| StoreError::UnknownType(type_name.to_string()))
    }

    fn query(&self, type_name: &str) -> Result<Query, StoreError> {
        self.type_schema(type_name)?;
        Ok(Query::new(type_name))
    }

    fn new_record(&self, type_name: &str) -> Result<Record, StoreError> {
        Ok(self.type_schema(type_name)?.new_record())
    }

    /// Fetch the records reached through `relation` on `record`.
    async fn related(&self, record: &Record, relation: &str) -> Result<Related, StoreError> {
        let def = self
            .type_schema(record.type_name())?
            .relation(relation)
            .cloned()
            .ok_or_else(|| StoreError::RelationNotFound {
                type_name: record.type_name().to_string(),
                relation: relation.to_string(),
            })?;

        match def {
            RelationDef::BelongsTo { target } => {
                let foreign_key = format!("{}_id", relation);
                match record.get(&foreign_key).filter(|v| !v.is_null()) {
                    Some(id) => {
                        let related = self.find(&target, &id_to_string(id)).await?;
                        Ok(Related::One(related.map(Box::new)))
                    }
                    None => Ok(Related::One(None)),
                }
            }
            RelationDef::HasMany { target, foreign_key } => {
                let Some(id) = record.id() else {
                    return Ok(Related::Many(vec![]));
                };
                let mut query = self.query(&target)?;
                query.filter_eq(foreign_key, id.clone());
                Ok(Related::Many(self.all(&query).await?))
            }
        }
    }
}
