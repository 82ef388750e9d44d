use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::pagination::PageLinks;
use crate::error::ApiError;

/// Media type declared on every response
pub const CONTENT_TYPE: &str = "application/vnd.api+json";

/// Top-level JSON:API document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<PageLinks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Value>>,
    /// Non-breaking errors; reserved and currently never populated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
}

impl Document {
    pub fn new(data: Value) -> Self {
        Self { data, links: None, included: None, errors: vec![] }
    }

    pub fn with_links(mut self, links: PageLinks) -> Self {
        self.links = Some(links);
        self
    }

    pub fn with_included(mut self, included: Vec<Value>) -> Self {
        self.included = Some(included);
        self
    }
}

/// Response envelope produced by the fulfiller. Converted to HTTP at the edge.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
}

impl Response {
    pub fn new(status: StatusCode, body: Option<Value>) -> Self {
        Self { status, headers: HeaderMap::new(), body }
    }

    /// Response with no body (OPTIONS, DELETE)
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, None)
    }

    pub fn document(status: StatusCode, document: Document) -> Self {
        let body = match serde_json::to_value(&document) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response document: {}", e);
                return Self::error(&ApiError::DatabaseRequestFailed { exception: e.to_string() }, 0);
            }
        };
        Self::new(status, Some(body))
    }

    pub fn error(err: &ApiError, scope: u32) -> Self {
        Self::new(err.status_code(), Some(err.to_document(scope)))
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => tracing::warn!("Dropping invalid {} header value '{}': {}", name, value, e),
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut headers = self.headers;
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));

        // 204 never carries a body
        if self.status == StatusCode::NO_CONTENT {
            return (self.status, headers).into_response();
        }

        let body = match self.body {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        (self.status, headers, body).into_response()
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        Self::error(&err, 0)
    }
}

/// Body used when a handler produced nothing: `[]` for collections, `null` by id
pub fn empty_data(has_id: bool) -> Value {
    if has_id {
        Value::Null
    } else {
        json!([])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_omits_unset_members() {
        let value = serde_json::to_value(Document::new(json!([]))).unwrap();
        assert_eq!(value, json!({"data": []}));

        let value = serde_json::to_value(Document::new(Value::Null).with_included(vec![])).unwrap();
        assert_eq!(value, json!({"data": null, "included": []}));
    }

    #[test]
    fn error_response_carries_scoped_code() {
        let response = Response::error(&ApiError::NoIdProvided, 0x100);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().unwrap()["errors"][0]["code"], json!(0x104));
    }

    #[test]
    fn no_content_drops_body() {
        let response = Response::new(StatusCode::NO_CONTENT, Some(json!({"data": null}))).into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
    }

    #[test]
    fn empty_data_depends_on_id() {
        assert_eq!(empty_data(false), json!([]));
        assert_eq!(empty_data(true), Value::Null);
    }
}
