use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{Method as HttpMethod, Uri},
};

use crate::api::{Fulfiller, Request, Response};
use crate::config::config;
use crate::error::ApiError;
use crate::types::Method;

use super::AppState;

/// /:type
pub async fn collection(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
    method: HttpMethod,
    uri: Uri,
    body: Bytes,
) -> Response {
    dispatch(&state, Target { type_name, id: None, relation: None }, method, uri, body).await
}

/// /:type/:id
pub async fn record(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
    method: HttpMethod,
    uri: Uri,
    body: Bytes,
) -> Response {
    dispatch(&state, Target { type_name, id: Some(id), relation: None }, method, uri, body).await
}

/// /:type/:id/links/:relation and /:type/:id/:relation, GET only
pub async fn related(
    State(state): State<AppState>,
    Path((type_name, id, rest)): Path<(String, String, String)>,
    method: HttpMethod,
    uri: Uri,
) -> Response {
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let relation = match segments.as_slice() {
        ["links", relation] | [relation] => relation.to_string(),
        _ => return ApiError::not_found(type_name, id).into(),
    };
    if method != HttpMethod::GET {
        return ApiError::MethodNotAllowed { method: method.to_string() }.into();
    }
    dispatch(&state, Target { type_name, id: Some(id), relation: Some(relation) }, method, uri, Bytes::new()).await
}

struct Target {
    type_name: String,
    id: Option<String>,
    relation: Option<String>,
}

async fn dispatch(state: &AppState, target: Target, method: HttpMethod, uri: Uri, body: Bytes) -> Response {
    let Some(resource) = state.registry.get(&target.type_name) else {
        tracing::debug!("No resource declared for '{}'", target.type_name);
        return ApiError::not_found(target.type_name, target.id.unwrap_or_default()).into();
    };
    let settings = resource.config();

    let Some(method) = Method::from_http(&method) else {
        let err = ApiError::MethodNotAllowed { method: method.to_string() };
        return Response::error(&err, settings.error_scope);
    };

    let body = match String::from_utf8(body.to_vec()) {
        Ok(body) => body,
        Err(_) => {
            let err = ApiError::malformed("request body is not valid UTF-8");
            return Response::error(&err, settings.error_scope);
        }
    };

    if config().api.enable_request_logging {
        tracing::info!("{} {}", method, uri);
    }

    let mut request = match Request::from_query(uri.to_string(), method, uri.query(), settings.page_size, settings.max_page_size) {
        Ok(request) => request,
        Err(err) => return Response::error(&err, settings.error_scope),
    };
    if let Some(id) = target.id {
        request = request.with_id(id);
    }
    if let Some(relation) = target.relation {
        request = request.with_relation(relation);
    }
    if !body.is_empty() {
        request = request.with_content(body);
    }

    Fulfiller::new(state.store.as_ref(), resource).respond(&request).await
}
