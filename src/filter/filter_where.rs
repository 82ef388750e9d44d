use std::collections::BTreeMap;

use serde_json::Value;

use super::types::{FilterValue, FilterWhereInfo};
use crate::database::record::id_to_string;
use crate::database::store::Query;

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Translate request filters into query predicates: a set value becomes an
    /// OR across its members, and every key is AND-ed with the others.
    pub fn apply(query: &mut Query, filters: &BTreeMap<String, FilterValue>) {
        for (column, value) in filters {
            match value {
                FilterValue::One(v) => {
                    query.filter_eq(column.clone(), Value::String(v.clone()));
                }
                FilterValue::Any(vs) => {
                    query.filter_or_eq(
                        column.clone(),
                        vs.iter().cloned().map(Value::String).collect(),
                    );
                }
            }
        }
    }

    /// Render conditions as a SQL predicate with positional parameters.
    /// Comparisons are made on the text form of the column so URL filter
    /// values match numeric and textual columns alike.
    pub fn generate(conditions: &[FilterWhereInfo], starting_param_index: usize) -> (String, Vec<Value>) {
        let mut filter_where = Self::new(starting_param_index);
        let parts: Vec<String> = conditions
            .iter()
            .map(|c| filter_where.build_sql_condition(c))
            .collect();
        let where_clause = if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") };
        (where_clause, filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        match condition {
            FilterWhereInfo::Eq { column, value } => {
                if value.is_null() {
                    format!("\"{}\" IS NULL", column)
                } else {
                    format!("\"{}\"::text = {}", column, self.param(value))
                }
            }
            FilterWhereInfo::AnyOf { column, values } => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let alternatives: Vec<String> = values
                    .iter()
                    .map(|v| format!("\"{}\"::text = {}", column, self.param(v)))
                    .collect();
                format!("({})", alternatives.join(" OR "))
            }
        }
    }

    fn param(&mut self, value: &Value) -> String {
        self.param_values.push(Value::String(id_to_string(value)));
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
