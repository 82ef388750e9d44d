// JSON:API error taxonomy
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::database::store::StoreError;
use crate::filter::FilterError;
use crate::types::Method;

/// Per-kind error bits. The low 16 bits identify the kind; resource types
/// reserve the bits above through their `error_scope`.
pub mod bits {
    pub const RESOURCE_NOT_FOUND: u32 = 1;
    pub const UNKNOWN_RELATION: u32 = 2;
    pub const NO_ID_PROVIDED: u32 = 4;
    pub const MISSING_TYPE_PARAMETER: u32 = 8;
    pub const METHOD_NOT_ALLOWED: u32 = 16;
    pub const INVALID_PAGE_PARAMETER: u32 = 32;
    pub const MALFORMED_PAYLOAD: u32 = 64;
    pub const TYPE_MISMATCH: u32 = 128;
    pub const SORT_DIRECTION_MISSING: u32 = 256;
    pub const SAVE_FAILED: u32 = 512;
    pub const DATABASE_REQUEST_FAILED: u32 = 1024;
}

/// Errors that end the current request. Each renders as a JSON:API error object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Method {method} is not allowed")]
    MethodNotAllowed { method: String },

    #[error("No ID provided")]
    NoIdProvided,

    #[error("Resource {type_name}/{id} not found")]
    ResourceNotFound { type_name: String, id: String },

    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Resource object is missing its type")]
    MissingTypeParameter,

    #[error("Expected type '{expected}', got '{given}'")]
    TypeMismatch { expected: String, given: String },

    #[error("Sort specifier '{specifier}' is missing a direction")]
    SortDirectionMissing { specifier: String },

    #[error("Invalid value '{value}' for {parameter}")]
    InvalidPageParameter { parameter: String, value: String },

    #[error("Failed to save resource")]
    SaveFailed { exception: Option<String> },

    #[error("Database request failed: {exception}")]
    DatabaseRequestFailed { exception: String },

    #[error("Unknown relation '{relation}'")]
    UnknownRelation { relation: String },
}

impl ApiError {
    pub fn method_not_allowed(method: Method) -> Self {
        ApiError::MethodNotAllowed { method: method.to_string() }
    }

    pub fn not_found(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::ResourceNotFound { type_name: type_name.into(), id: id.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        ApiError::MalformedPayload { reason: reason.into() }
    }

    pub fn save_failed(exception: Option<String>) -> Self {
        ApiError::SaveFailed { exception }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NoIdProvided
            | ApiError::MalformedPayload { .. }
            | ApiError::MissingTypeParameter
            | ApiError::SortDirectionMissing { .. }
            | ApiError::InvalidPageParameter { .. } => StatusCode::BAD_REQUEST,
            ApiError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::TypeMismatch { .. } => StatusCode::CONFLICT,
            ApiError::SaveFailed { .. }
            | ApiError::DatabaseRequestFailed { .. }
            | ApiError::UnknownRelation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_bit(&self) -> u32 {
        match self {
            ApiError::ResourceNotFound { .. } => bits::RESOURCE_NOT_FOUND,
            ApiError::UnknownRelation { .. } => bits::UNKNOWN_RELATION,
            ApiError::NoIdProvided => bits::NO_ID_PROVIDED,
            ApiError::MissingTypeParameter => bits::MISSING_TYPE_PARAMETER,
            ApiError::MethodNotAllowed { .. } => bits::METHOD_NOT_ALLOWED,
            ApiError::InvalidPageParameter { .. } => bits::INVALID_PAGE_PARAMETER,
            ApiError::MalformedPayload { .. } => bits::MALFORMED_PAYLOAD,
            ApiError::TypeMismatch { .. } => bits::TYPE_MISMATCH,
            ApiError::SortDirectionMissing { .. } => bits::SORT_DIRECTION_MISSING,
            ApiError::SaveFailed { .. } => bits::SAVE_FAILED,
            ApiError::DatabaseRequestFailed { .. } => bits::DATABASE_REQUEST_FAILED,
        }
    }

    /// Integer error code: the resource type's scope bits OR-ed with the kind bit
    pub fn code(&self, scope: u32) -> u32 {
        scope | self.error_bit()
    }

    pub fn title(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed { .. } => "Method not allowed",
            ApiError::NoIdProvided => "No ID provided",
            ApiError::ResourceNotFound { .. } => "Resource not found",
            ApiError::MalformedPayload { .. } => "Payload either contains misformed JSON or missing \"data\" parameter",
            ApiError::MissingTypeParameter => "\"type\" parameter not set in request",
            ApiError::TypeMismatch { .. } => "\"type\" parameter is not valid for this resource",
            ApiError::SortDirectionMissing { .. } => "Sort direction not specified but is required. Expecting \"+\" or \"-\"",
            ApiError::InvalidPageParameter { .. } => "Page parameters must be positive integers",
            ApiError::SaveFailed { .. } => "An unknown error occurred while saving the resource",
            ApiError::DatabaseRequestFailed { .. } => "Database request failed",
            ApiError::UnknownRelation { .. } => "Relation requested does not exist on this resource",
        }
    }

    /// Structured attributes rendered alongside status/code/title
    pub fn detail(&self) -> Map<String, Value> {
        let mut detail = Map::new();
        match self {
            ApiError::MethodNotAllowed { method } => {
                detail.insert("method".into(), json!(method));
            }
            ApiError::ResourceNotFound { type_name, id } => {
                detail.insert("type".into(), json!(type_name));
                detail.insert("id".into(), json!(id));
            }
            ApiError::MalformedPayload { reason } => {
                detail.insert("detail".into(), json!(reason));
            }
            ApiError::TypeMismatch { expected, given } => {
                detail.insert("expected".into(), json!(expected));
                detail.insert("given".into(), json!(given));
            }
            ApiError::SortDirectionMissing { specifier } => {
                detail.insert("sort".into(), json!(specifier));
            }
            ApiError::InvalidPageParameter { parameter, value } => {
                detail.insert("parameter".into(), json!(parameter));
                detail.insert("value".into(), json!(value));
            }
            ApiError::SaveFailed { exception: Some(exception) }
            | ApiError::DatabaseRequestFailed { exception } => {
                detail.insert("exception".into(), json!(exception));
            }
            ApiError::UnknownRelation { relation } => {
                detail.insert("relation".into(), json!(relation));
            }
            ApiError::NoIdProvided | ApiError::MissingTypeParameter | ApiError::SaveFailed { exception: None } => {}
        }
        detail
    }

    /// Single JSON:API error object
    pub fn to_json(&self, scope: u32) -> Value {
        let mut object = Map::new();
        object.insert("status".into(), json!(self.status_code().as_u16()));
        object.insert("code".into(), json!(self.code(scope)));
        object.insert("title".into(), json!(self.title()));
        for (key, value) in self.detail() {
            object.insert(key, value);
        }
        Value::Object(object)
    }

    /// Full error document: `{"errors": [ ... ]}`
    pub fn to_document(&self, scope: u32) -> Value {
        json!({ "errors": [self.to_json(scope)] })
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RelationNotFound { relation, .. } => ApiError::UnknownRelation { relation },
            other => {
                tracing::error!("Entity store error: {}", other);
                ApiError::DatabaseRequestFailed { exception: other.to_string() }
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::SortDirectionMissing(specifier) => ApiError::SortDirectionMissing { specifier },
            other => {
                tracing::error!("Query rendering error: {}", other);
                ApiError::DatabaseRequestFailed { exception: other.to_string() }
            }
        }
    }
}

// Errors raised before a resource type is resolved carry no scope
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        crate::api::response::Response::error(&self, 0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_combines_scope_and_kind() {
        let err = ApiError::NoIdProvided;
        assert_eq!(err.code(0), 4);
        assert_eq!(err.code(0x1_0000), 0x1_0004);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_object_carries_detail_attributes() {
        let err = ApiError::TypeMismatch { expected: "posts".into(), given: "users".into() };
        let v = err.to_json(256);
        assert_eq!(v["status"], json!(409));
        assert_eq!(v["code"], json!(256 | 128));
        assert_eq!(v["expected"], json!("posts"));
        assert_eq!(v["given"], json!("users"));
        assert!(v["title"].is_string());
    }

    #[test]
    fn store_errors_map_by_kind() {
        let unknown: ApiError = StoreError::RelationNotFound { type_name: "posts".into(), relation: "x".into() }.into();
        assert_eq!(unknown, ApiError::UnknownRelation { relation: "x".into() });
        assert_eq!(unknown.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let failed: ApiError = StoreError::QueryError("boom".into()).into();
        assert_eq!(failed.to_json(0)["exception"], json!("Query error: boom"));
    }

    #[test]
    fn sort_errors_keep_their_kind() {
        let err: ApiError = FilterError::SortDirectionMissing("name".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_json(0)["sort"], json!("name"));
    }
}
