use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, FilterWhereInfo, SqlResult};
use crate::database::store::Query;

/// SQL rendering of a store [`Query`] against one table.
pub struct Filter {
    table_name: String,
    where_data: Vec<FilterWhereInfo>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            where_data: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn from_query(table_name: impl Into<String>, query: &Query) -> Result<Self, FilterError> {
        let mut filter = Self::new(table_name)?;
        for condition in query.conditions() {
            Self::validate_identifier(condition.column())
                .map_err(|_| FilterError::InvalidColumn(condition.column().to_string()))?;
        }
        for order in query.order() {
            Self::validate_identifier(&order.column)
                .map_err(|_| FilterError::InvalidColumn(order.column.clone()))?;
        }
        filter.where_data = query.conditions().to_vec();
        filter.order_data = query.order().to_vec();
        Ok(filter)
    }

    pub fn limit(&mut self, limit: u64, offset: Option<u64>) -> Result<&mut Self, FilterError> {
        if limit == 0 { return Err(FilterError::InvalidLimit("Limit must be positive".to_string())); }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    /// Rows come back as a single JSON column named `row`.
    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.where_data, 0);
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT row_to_json(t) AS row".to_string(),
            format!("FROM \"{}\" t", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        SqlResult { query, params }
    }

    /// Count ignores ordering and limits.
    pub fn to_count_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.where_data, 0);
        let query = format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_clause);
        SqlResult { query, params }
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty() { return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string())); }
        Self::validate_identifier(name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
    }

    /// Identifiers are quoted into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
    pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        };
        if valid { Ok(()) } else { Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", name))) }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }
}
