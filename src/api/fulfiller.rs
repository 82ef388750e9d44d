use axum::http::StatusCode;
use serde_json::Value;

use crate::api::format::resource_object;
use crate::api::include::{load_relations, resolve};
use crate::api::pagination::Page;
use crate::api::request::Request;
use crate::api::resource::Resource;
use crate::api::response::{empty_data, Document, Response};
use crate::database::{EntityStore, Record};
use crate::error::ApiError;
use crate::types::Method;

/// What a verb handler produced
#[derive(Debug)]
pub enum Outcome {
    /// Nothing found: `[]` for collections, `null` by id
    Empty,
    Record(Record),
    Records(Vec<Record>),
    Page(Page),
    /// Finished response, passed through untouched
    Response(Response),
}

/// Runs one request against one resource type
pub struct Fulfiller<'a> {
    store: &'a dyn EntityStore,
    resource: &'a Resource,
}

impl<'a> Fulfiller<'a> {
    pub fn new(store: &'a dyn EntityStore, resource: &'a Resource) -> Self {
        Self { store, resource }
    }

    pub fn store(&self) -> &'a dyn EntityStore {
        self.store
    }

    pub fn resource(&self) -> &'a Resource {
        self.resource
    }

    /// Like [`Fulfiller::fulfill`], with failures rendered as error documents
    /// scoped to this resource type
    pub async fn respond(&self, request: &Request) -> Response {
        match self.fulfill(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!("{} {} failed: {}", request.method(), request.url(), err);
                Response::error(&err, self.resource.config().error_scope)
            }
        }
    }

    pub async fn fulfill(&self, request: &Request) -> Result<Response, ApiError> {
        let method = request.method();
        let handler = self
            .resource
            .handler(method)
            .ok_or_else(|| ApiError::method_not_allowed(method))?;

        tracing::debug!(
            "Dispatching {} {} (id: {:?}, relation: {:?})",
            method,
            self.resource.type_name(),
            request.id(),
            request.relation()
        );
        let outcome = handler(self, request).await?;
        let status = status_for(method);

        let response = match outcome {
            Outcome::Response(response) => response,
            // 204 carries no body, so nothing is loaded or included
            _ if status == StatusCode::NO_CONTENT => Response::empty(status),
            Outcome::Empty => Response::document(status, Document::new(empty_data(request.id().is_some()))),
            Outcome::Record(mut record) => {
                load_relations(self.store, &mut record).await?;
                let included = self.included(std::slice::from_ref(&record), request).await?;
                let data = self.serialize(&record);
                Response::document(status, self.document(data, included))
            }
            Outcome::Records(mut records) => {
                for record in records.iter_mut() {
                    load_relations(self.store, record).await?;
                }
                let included = self.included(&records, request).await?;
                let data = Value::Array(records.iter().map(|r| self.serialize(r)).collect());
                Response::document(status, self.document(data, included))
            }
            Outcome::Page(mut page) => {
                for record in page.items.iter_mut() {
                    load_relations(self.store, record).await?;
                }
                let included = self.included(&page.items, request).await?;
                let data = Value::Array(page.items.iter().map(|r| self.serialize(r)).collect());
                Response::document(status, self.document(data, included).with_links(page.links()))
            }
        };
        Ok(response)
    }

    async fn included(&self, records: &[Record], request: &Request) -> Result<Option<Vec<Value>>, ApiError> {
        if request.include().is_empty() {
            return Ok(None);
        }
        let included = resolve(self.store, records, request.include()).await?;
        Ok(Some(included.iter().map(|r| self.serialize(r)).collect()))
    }

    fn document(&self, data: Value, included: Option<Vec<Value>>) -> Document {
        match included {
            Some(included) => Document::new(data).with_included(included),
            None => Document::new(data),
        }
    }

    fn serialize(&self, record: &Record) -> Value {
        resource_object(record, self.hidden_for(record.type_name()))
    }

    /// Guarded attributes of the fulfiller's own type come from its config;
    /// related types use their declarations.
    fn hidden_for(&self, type_name: &str) -> &[String] {
        if type_name == self.resource.type_name() {
            return &self.resource.config().guarded;
        }
        match self.store.schema().get(type_name) {
            Some(schema) => &schema.guarded,
            None => &[],
        }
    }
}

pub fn status_for(method: Method) -> StatusCode {
    match method {
        Method::Post => StatusCode::CREATED,
        Method::Delete => StatusCode::NO_CONTENT,
        _ => StatusCode::OK,
    }
}
