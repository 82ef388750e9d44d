//! PostgreSQL entity store. Every query returns rows as `row_to_json` so
//! records stay schema-agnostic.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgArguments, postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::database::record::Record;
use crate::database::schema::Schema;
use crate::database::store::{EntityStore, Query, StoreError};
use crate::filter::types::SqlResult;
use crate::filter::Filter;

pub struct PgStore {
    pool: PgPool,
    schema: Schema,
    log_queries: bool,
}

impl PgStore {
    pub async fn connect(database_url: &str, schema: Schema, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(database_url)
            .await?;
        tracing::info!("Connected PostgreSQL store ({} max connections)", config.max_connections);
        Ok(Self::with_pool(pool, schema, config.enable_query_logging))
    }

    pub fn with_pool(pool: PgPool, schema: Schema, log_queries: bool) -> Self {
        Self { pool, schema, log_queries }
    }

    fn filter_for(&self, query: &Query) -> Result<Filter, StoreError> {
        let type_schema = self.type_schema(query.type_name())?;
        Ok(Filter::from_query(type_schema.table_name(), query)?)
    }

    async fn fetch_rows(&self, type_name: &str, sql: SqlResult) -> Result<Vec<Record>, StoreError> {
        let type_schema = self.type_schema(type_name)?;
        if self.log_queries {
            tracing::debug!("SQL: {} {:?}", sql.query, sql.params);
        }
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row_to_map(row).map(|map| type_schema.record_from_row(map)))
            .collect()
    }

    async fn fetch_one(&self, sql: SqlResult) -> Result<Option<Map<String, Value>>, StoreError> {
        if self.log_queries {
            tracing::debug!("SQL: {} {:?}", sql.query, sql.params);
        }
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        match q.fetch_optional(&self.pool).await? {
            Some(row) => Ok(Some(row_to_map(&row)?)),
            None => Ok(None),
        }
    }
}

fn row_to_map(row: &sqlx::postgres::PgRow) -> Result<Map<String, Value>, StoreError> {
    match row.try_get::<Value, _>("row")? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::QueryError(format!("unexpected row format: {}", other))),
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Build `INSERT ... RETURNING` for an unsaved record
fn insert_sql(table: &str, fields: &Map<String, Value>) -> Result<SqlResult, StoreError> {
    if fields.is_empty() {
        return Ok(SqlResult {
            query: format!("INSERT INTO {} AS t DEFAULT VALUES RETURNING row_to_json(t) AS row", quote(table)),
            params: vec![],
        });
    }
    let mut columns = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    let mut params = Vec::with_capacity(fields.len());
    for (i, (column, value)) in fields.iter().enumerate() {
        Filter::validate_identifier(column)?;
        columns.push(quote(column));
        placeholders.push(format!("${}", i + 1));
        params.push(value.clone());
    }
    Ok(SqlResult {
        query: format!(
            "INSERT INTO {} AS t ({}) VALUES ({}) RETURNING row_to_json(t) AS row",
            quote(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

/// Build `UPDATE ... RETURNING` keyed on the primary key's text form
fn update_sql(table: &str, primary_key: &str, id: &str, fields: &Map<String, Value>) -> Result<SqlResult, StoreError> {
    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for (column, value) in fields.iter().filter(|(column, _)| column.as_str() != primary_key) {
        Filter::validate_identifier(column)?;
        params.push(value.clone());
        assignments.push(format!("{} = ${}", quote(column), params.len()));
    }
    params.push(Value::String(id.to_string()));
    let id_param = params.len();
    let query = if assignments.is_empty() {
        format!(
            "SELECT row_to_json(t) AS row FROM {} t WHERE {}::text = ${}",
            quote(table), quote(primary_key), id_param
        )
    } else {
        format!(
            "UPDATE {} AS t SET {} WHERE t.{}::text = ${} RETURNING row_to_json(t) AS row",
            quote(table), assignments.join(", "), quote(primary_key), id_param
        )
    };
    Ok(SqlResult { query, params })
}

#[async_trait]
impl EntityStore for PgStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn find(&self, type_name: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let type_schema = self.type_schema(type_name)?;
        let sql = SqlResult {
            query: format!(
                "SELECT row_to_json(t) AS row FROM {} t WHERE {}::text = $1",
                quote(type_schema.table_name()),
                quote(&type_schema.primary_key)
            ),
            params: vec![Value::String(id.to_string())],
        };
        Ok(self.fetch_one(sql).await?.map(|row| type_schema.record_from_row(row)))
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let sql = self.filter_for(query)?.to_count_sql();
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn page(&self, query: &Query, number: u32, size: u32) -> Result<Vec<Record>, StoreError> {
        let mut filter = self.filter_for(query)?;
        let offset = u64::from(number.saturating_sub(1)) * u64::from(size);
        filter.limit(u64::from(size), Some(offset))?;
        self.fetch_rows(query.type_name(), filter.to_sql()).await
    }

    async fn all(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let sql = self.filter_for(query)?.to_sql();
        self.fetch_rows(query.type_name(), sql).await
    }

    async fn save(&self, record: &mut Record) -> Result<bool, StoreError> {
        let type_schema = self.type_schema(record.type_name())?;
        let table = type_schema.table_name();

        let sql = if record.is_persisted() {
            let Some(id) = record.id_string() else {
                return Ok(false);
            };
            update_sql(table, &type_schema.primary_key, &id, record.attributes())?
        } else {
            let mut fields = record.attributes().clone();
            // Let the column default assign the key
            if fields.get(&type_schema.primary_key).map_or(false, Value::is_null) {
                fields.remove(&type_schema.primary_key);
            }
            insert_sql(table, &fields)?
        };

        match self.fetch_one(sql).await? {
            Some(row) => {
                record.mark_persisted(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, record: &Record) -> Result<(), StoreError> {
        let type_schema = self.type_schema(record.type_name())?;
        let Some(id) = record.id_string() else {
            return Ok(());
        };
        let query = format!(
            "DELETE FROM {} WHERE {}::text = $1",
            quote(type_schema.table_name()),
            quote(&type_schema.primary_key)
        );
        sqlx::query(&query).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays and objects land in json/jsonb columns
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
