//! JSON:API request-fulfillment pipeline.

pub mod format;
pub mod fulfiller;
pub mod include;
pub mod linkage;
pub mod pagination;
pub mod request;
pub mod resource;
pub mod response;
pub mod verbs;

pub use fulfiller::{Fulfiller, Outcome};
pub use pagination::{Page, PageLinks};
pub use request::Request;
pub use resource::{Registry, Resource, ResourceConfig};
pub use response::{Document, Response, CONTENT_TYPE};
pub use verbs::VerbHandler;
