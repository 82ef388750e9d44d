use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Sort specifier '{0}' has no direction; prefix it with '+' or '-'")]
    SortDirectionMissing(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}
