//! Default per-verb handling.

use axum::http::{header, StatusCode};
use futures::future::BoxFuture;

use crate::api::fulfiller::{Fulfiller, Outcome};
use crate::api::linkage::{self, ParsedResource};
use crate::api::pagination::paginate;
use crate::api::request::Request;
use crate::api::response::Response;
use crate::database::{Record, Related};
use crate::error::ApiError;
use crate::filter::{FilterOrder, FilterWhere};
use crate::types::Method;

/// Handler registered for one verb on one resource type
pub type VerbHandler = for<'a> fn(&'a Fulfiller<'a>, &'a Request) -> BoxFuture<'a, Result<Outcome, ApiError>>;

pub fn default_handler(method: Method) -> VerbHandler {
    match method {
        Method::Get => get as VerbHandler,
        Method::Post => post,
        // PATCH replaces like PUT
        Method::Put | Method::Patch => put,
        Method::Delete => delete,
        Method::Options => options,
    }
}

fn get<'a>(f: &'a Fulfiller<'a>, request: &'a Request) -> BoxFuture<'a, Result<Outcome, ApiError>> {
    Box::pin(handle_get(f, request))
}

fn post<'a>(f: &'a Fulfiller<'a>, request: &'a Request) -> BoxFuture<'a, Result<Outcome, ApiError>> {
    Box::pin(handle_post(f, request))
}

fn put<'a>(f: &'a Fulfiller<'a>, request: &'a Request) -> BoxFuture<'a, Result<Outcome, ApiError>> {
    Box::pin(handle_put(f, request))
}

fn delete<'a>(f: &'a Fulfiller<'a>, request: &'a Request) -> BoxFuture<'a, Result<Outcome, ApiError>> {
    Box::pin(handle_delete(f, request))
}

fn options<'a>(f: &'a Fulfiller<'a>, request: &'a Request) -> BoxFuture<'a, Result<Outcome, ApiError>> {
    Box::pin(handle_options(f, request))
}

pub async fn handle_get(f: &Fulfiller<'_>, request: &Request) -> Result<Outcome, ApiError> {
    let type_name = f.resource().type_name();

    if let Some(id) = request.id() {
        let Some(record) = f.store().find(type_name, id).await? else {
            return Ok(Outcome::Empty);
        };
        let Some(relation) = request.relation() else {
            return Ok(Outcome::Record(record));
        };
        if !record.exposes(relation) {
            tracing::warn!("Relation '{}' is not exposed on {}", relation, type_name);
            return Ok(Outcome::Empty);
        }
        return Ok(match f.store().related(&record, relation).await? {
            Related::One(Some(related)) => Outcome::Record(*related),
            Related::One(None) => Outcome::Empty,
            Related::Many(related) => Outcome::Records(related),
        });
    }

    let mut query = f.store().query(type_name)?;
    FilterWhere::apply(&mut query, request.filter());

    // A bad specifier fails before anything reaches the store
    let order = FilterOrder::parse_all(request.sort())?;

    // Count before ordering is applied so sorting cannot skew the total
    let mut total = None;
    if !order.is_empty() && request.page_number().is_some() {
        total = Some(f.store().count(&query).await?);
    }
    FilterOrder::apply(&mut query, &order);

    match request.page_number() {
        Some(number) => Ok(Outcome::Page(paginate(f.store(), &query, request, number, total).await?)),
        None => Ok(Outcome::Records(f.store().all(&query).await?)),
    }
}

pub async fn handle_post(f: &Fulfiller<'_>, request: &Request) -> Result<Outcome, ApiError> {
    let config = f.resource().config();
    let body = linkage::decode(request.content())?;

    let mut saved = None;
    for resource in linkage::parse(&body, &config.type_name)? {
        let mut record = f.store().new_record(&config.type_name)?;
        assign(&mut record, resource, &config.guarded);
        save(f, &mut record).await?;
        saved = Some(record);
    }

    Ok(saved.map(Outcome::Record).unwrap_or(Outcome::Empty))
}

pub async fn handle_put(f: &Fulfiller<'_>, request: &Request) -> Result<Outcome, ApiError> {
    let config = f.resource().config();
    let id = request.id().ok_or(ApiError::NoIdProvided)?;
    let mut record = f
        .store()
        .find(&config.type_name, id)
        .await?
        .ok_or_else(|| ApiError::not_found(&config.type_name, id))?;

    let body = linkage::decode(request.content())?;
    for mut resource in linkage::parse(&body, &config.type_name)? {
        // The URL decides which row is written
        resource.attributes.remove(record.primary_key_name());
        assign(&mut record, resource, &config.guarded);
        save(f, &mut record).await?;
    }

    Ok(Outcome::Record(record))
}

pub async fn handle_delete(f: &Fulfiller<'_>, request: &Request) -> Result<Outcome, ApiError> {
    let type_name = f.resource().type_name();
    let id = request.id().ok_or(ApiError::NoIdProvided)?;

    match f.store().find(type_name, id).await? {
        Some(record) => {
            f.store().delete(&record).await?;
            tracing::debug!("Deleted {}/{}", type_name, id);
            Ok(Outcome::Record(record))
        }
        None => Ok(Outcome::Empty),
    }
}

pub async fn handle_options(f: &Fulfiller<'_>, _request: &Request) -> Result<Outcome, ApiError> {
    let allow: Vec<&str> = f.resource().allowed_methods().iter().map(Method::as_str).collect();
    let response = Response::empty(StatusCode::OK).with_header(header::ALLOW, &allow.join(","));
    Ok(Outcome::Response(response))
}

/// To-many linkage is reported but never applied
fn assign(record: &mut Record, resource: ParsedResource, guarded: &[String]) {
    for (relation, ids) in &resource.to_many {
        tracing::debug!("Discarding to-many linkage '{}' ({} ids) on {}", relation, ids.len(), record.type_name());
    }
    record.fill(resource.attributes, guarded);
}

async fn save(f: &Fulfiller<'_>, record: &mut Record) -> Result<(), ApiError> {
    match f.store().save(record).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!("Store declined to save {}", record);
            Err(ApiError::save_failed(None))
        }
        Err(e) => {
            tracing::error!("Failed to save {}: {}", record, e);
            Err(ApiError::save_failed(Some(e.to_string())))
        }
    }
}
