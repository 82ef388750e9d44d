//! In-process entity store. Backs the test suites and the server when no
//! database URL is configured.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::database::record::{id_to_string, Record};
use crate::database::schema::Schema;
use crate::database::store::{EntityStore, Query, StoreError};
use crate::filter::{FilterOrderInfo, FilterWhereInfo, SortDirection};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Map<String, Value>>,
    next_id: u64,
}

pub struct MemoryStore {
    schema: Schema,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(schema: Schema) -> Self {
        Self { schema, tables: RwLock::new(HashMap::new()) }
    }

    /// Insert a row directly, bypassing the request pipeline
    pub async fn seed(&self, type_name: &str, fields: Value) -> Result<Record, StoreError> {
        let Value::Object(fields) = fields else {
            return Err(StoreError::QueryError("seed rows must be JSON objects".to_string()));
        };
        let mut record = self.new_record(type_name)?;
        for (key, value) in fields {
            record.set(key, value);
        }
        self.save(&mut record).await?;
        Ok(record)
    }

    async fn select(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let type_schema = self.type_schema(query.type_name())?;
        let tables = self.tables.read().await;
        let mut rows: Vec<&Map<String, Value>> = match tables.get(query.type_name()) {
            Some(table) => table.rows.iter().filter(|row| matches_all(row, query.conditions())).collect(),
            None => vec![],
        };
        // sort_by is stable, so unordered ties keep insertion order
        rows.sort_by(|a, b| compare_rows(a, b, query.order()));
        Ok(rows.into_iter().map(|row| type_schema.record_from_row(row.clone())).collect())
    }
}

fn matches_all(row: &Map<String, Value>, conditions: &[FilterWhereInfo]) -> bool {
    conditions.iter().all(|condition| match condition {
        FilterWhereInfo::Eq { column, value } => values_equal(row.get(column), value),
        FilterWhereInfo::AnyOf { column, values } => values.iter().any(|v| values_equal(row.get(column), v)),
    })
}

/// Equality on the text form, so a URL filter `"5"` matches a stored `5`
fn values_equal(stored: Option<&Value>, wanted: &Value) -> bool {
    match (stored, wanted) {
        (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
        (None, _) | (Some(Value::Null), _) | (Some(_), Value::Null) => false,
        (Some(stored), wanted) => id_to_string(stored) == id_to_string(wanted),
    }
}

fn compare_rows(a: &Map<String, Value>, b: &Map<String, Value>, order: &[FilterOrderInfo]) -> Ordering {
    for info in order {
        let ordering = compare_values(a.get(&info.column), b.get(&info.column));
        let ordering = match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.map(|v| v.to_string()).cmp(&b.map(|v| v.to_string()))),
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn find(&self, type_name: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let type_schema = self.type_schema(type_name)?;
        let tables = self.tables.read().await;
        let row = tables.get(type_name).and_then(|table| {
            table
                .rows
                .iter()
                .find(|row| row.get(&type_schema.primary_key).map(id_to_string).as_deref() == Some(id))
        });
        Ok(row.map(|row| type_schema.record_from_row(row.clone())))
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        self.type_schema(query.type_name())?;
        let tables = self.tables.read().await;
        let count = tables
            .get(query.type_name())
            .map(|table| table.rows.iter().filter(|row| matches_all(row, query.conditions())).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn page(&self, query: &Query, number: u32, size: u32) -> Result<Vec<Record>, StoreError> {
        let offset = (number.saturating_sub(1) as usize).saturating_mul(size as usize);
        let rows = self.select(query).await?;
        Ok(rows.into_iter().skip(offset).take(size as usize).collect())
    }

    async fn all(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.select(query).await
    }

    async fn save(&self, record: &mut Record) -> Result<bool, StoreError> {
        let type_schema = self.type_schema(record.type_name())?;
        let primary_key = type_schema.primary_key.clone();
        let now = Value::String(Utc::now().to_rfc3339());

        let mut tables = self.tables.write().await;
        let table = tables.entry(record.type_name().to_string()).or_default();

        let mut fields = record.attributes().clone();
        fields.insert("updated_at".to_string(), now.clone());

        if record.is_persisted() {
            let Some(id) = record.id_string() else {
                return Ok(false);
            };
            let Some(row) = table
                .rows
                .iter_mut()
                .find(|row| row.get(&primary_key).map(id_to_string).as_deref() == Some(id.as_str()))
            else {
                return Ok(false);
            };
            *row = fields.clone();
            record.mark_persisted(fields);
            return Ok(true);
        }

        match fields.get(&primary_key).filter(|v| !v.is_null()) {
            Some(id) => {
                let id = id_to_string(id);
                let taken = table
                    .rows
                    .iter()
                    .any(|row| row.get(&primary_key).map(id_to_string).as_deref() == Some(id.as_str()));
                if taken {
                    tracing::warn!("Duplicate primary key {} for {}", id, record.type_name());
                    return Ok(false);
                }
                if let Ok(numeric) = id.parse::<u64>() {
                    table.next_id = table.next_id.max(numeric);
                }
            }
            None => {
                table.next_id += 1;
                fields.insert(primary_key, Value::from(table.next_id));
            }
        }
        fields.insert("created_at".to_string(), now);
        table.rows.push(fields.clone());
        record.mark_persisted(fields);
        Ok(true)
    }

    async fn delete(&self, record: &Record) -> Result<(), StoreError> {
        let Some(id) = record.id_string() else {
            return Ok(());
        };
        let mut tables = self.tables.write().await;
        if let Some(table) = tables.get_mut(record.type_name()) {
            let primary_key = record.primary_key_name();
            table
                .rows
                .retain(|row| row.get(primary_key).map(id_to_string).as_deref() != Some(id.as_str()));
        }
        Ok(())
    }
}
