use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::database::store::Query;

pub struct FilterOrder;

impl FilterOrder {
    /// Parse one signed sort specifier: `+col` or `%2Bcol` ascending, `-col` descending.
    pub fn parse(param: &str) -> Result<FilterOrderInfo, FilterError> {
        let (sort, column) = if let Some(rest) = param.strip_prefix('+') {
            (SortDirection::Asc, rest)
        } else if let Some(rest) = strip_prefix_ignore_case(param, "%2B") {
            (SortDirection::Asc, rest)
        } else if let Some(rest) = param.strip_prefix('-') {
            (SortDirection::Desc, rest)
        } else {
            return Err(FilterError::SortDirectionMissing(param.to_string()));
        };

        if column.is_empty() {
            return Err(FilterError::InvalidColumn(format!("empty sort column in '{}'", param)));
        }
        Ok(FilterOrderInfo { column: column.to_string(), sort })
    }

    /// Parse every specifier up front so a bad one fails before any query runs.
    pub fn parse_all(params: &[String]) -> Result<Vec<FilterOrderInfo>, FilterError> {
        params.iter().map(|s| Self::parse(s)).collect()
    }

    /// Apply in left-to-right precedence; the first specifier is the primary key.
    pub fn apply(query: &mut Query, infos: &[FilterOrderInfo]) {
        for info in infos {
            query.order_by(info.column.clone(), info.sort);
        }
    }

    /// Query-string form used in generated links. `+` is written as `%2B` so it
    /// survives form decoding.
    pub fn to_param(infos: &[FilterOrderInfo]) -> String {
        infos
            .iter()
            .map(|i| match i.sort {
                SortDirection::Asc => format!("%2B{}", i.column),
                SortDirection::Desc => format!("-{}", i.column),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() { return String::new(); }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.is_char_boundary(prefix.len()) && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
