use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value of a single `filter[column]` request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Any(Vec<String>),
}

impl FilterValue {
    /// Comma-separated input becomes a set; anything else is a scalar.
    pub fn parse(raw: &str) -> Self {
        if raw.contains(',') {
            FilterValue::Any(raw.split(',').map(|s| s.to_string()).collect())
        } else {
            FilterValue::One(raw.to_string())
        }
    }

    pub fn to_param(&self) -> String {
        match self {
            FilterValue::One(v) => v.clone(),
            FilterValue::Any(vs) => vs.join(","),
        }
    }
}

/// One equality predicate on a store query. Conditions on a query are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterWhereInfo {
    Eq { column: String, value: Value },
    /// Matches when the column equals any of the values
    AnyOf { column: String, values: Vec<Value> },
}

impl FilterWhereInfo {
    pub fn column(&self) -> &str {
        match self {
            FilterWhereInfo::Eq { column, .. } | FilterWhereInfo::AnyOf { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
