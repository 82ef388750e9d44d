// handlers/mod.rs - HTTP routing onto the fulfillment pipeline
//
// Every resource type shares three routes:
//   /:type                      collection (GET list, POST, OPTIONS)
//   /:type/:id                  single record (GET, PUT, PATCH, DELETE, OPTIONS)
//   /:type/:id/links/:relation  related records (GET); `/:type/:id/:relation` also works
pub mod health;
pub mod resource;

use axum::{
    extract::Request,
    http::{header, Method},
    response::Response,
    routing::{any, get},
    Router,
};
use std::convert::Infallible;
use std::sync::Arc;
use tower::{steer::Steer, util::BoxCloneService, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::Registry;
use crate::database::EntityStore;

/// Shared by every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, registry: Registry) -> Self {
        Self { store, registry: Arc::new(registry) }
    }
}

type RouteService = BoxCloneService<Request, Response, Infallible>;

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/:type", any(resource::collection))
        .route("/:type/:id", any(resource::record))
        .route("/:type/:id/*relation", any(resource::related))
        .with_state(state);

    // CorsLayer answers every OPTIONS itself, so only real preflights go through it
    let cors = ServiceBuilder::new().layer(CorsLayer::permissive()).service(api.clone());
    let services: Vec<RouteService> = vec![BoxCloneService::new(cors), BoxCloneService::new(api)];
    let steer = Steer::new(services, |request: &Request, _: &[RouteService]| usize::from(is_plain_options(request)));

    Router::new().fallback_service(steer).layer(TraceLayer::new_for_http())
}

/// OPTIONS without `Access-Control-Request-Method` is an API call, not a preflight
fn is_plain_options(request: &Request) -> bool {
    request.method() == Method::OPTIONS && !request.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}
