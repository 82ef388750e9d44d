use std::collections::BTreeMap;

use crate::api::verbs::{self, VerbHandler};
use crate::config::ApiConfig;
use crate::database::{Schema, TypeSchema};
use crate::types::Method;

/// Per-type settings handed to the fulfiller
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    pub type_name: String,
    pub page_size: u32,
    pub max_page_size: u32,
    /// Attributes never assigned from a write body nor rendered
    pub guarded: Vec<String>,
    /// Bits OR-ed into every error code raised for this type
    pub error_scope: u32,
    pub methods: Vec<Method>,
}

impl ResourceConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            page_size: crate::api::request::DEFAULT_PAGE_SIZE,
            max_page_size: 1000,
            guarded: vec!["created_at".to_string(), "updated_at".to_string()],
            error_scope: 0,
            methods: Method::ALL.to_vec(),
        }
    }

    pub fn from_type_schema(schema: &TypeSchema, api: &ApiConfig) -> Self {
        Self {
            type_name: schema.name.clone(),
            page_size: schema.page_size.unwrap_or(api.default_page_size).clamp(1, api.max_page_size.max(1)),
            max_page_size: api.max_page_size,
            guarded: schema.guarded.clone(),
            error_scope: schema.error_scope,
            methods: schema.methods.clone().unwrap_or_else(|| Method::ALL.to_vec()),
        }
    }
}

/// A resource type with its verb handlers. A verb without a handler is
/// answered with 405.
#[derive(Clone)]
pub struct Resource {
    config: ResourceConfig,
    handlers: BTreeMap<Method, VerbHandler>,
}

impl Resource {
    /// No handlers registered
    pub fn new(config: ResourceConfig) -> Self {
        Self { config, handlers: BTreeMap::new() }
    }

    /// Default handlers for every verb enabled in the config
    pub fn with_default_handlers(config: ResourceConfig) -> Self {
        let mut resource = Self::new(config);
        for method in resource.config.methods.clone() {
            resource.handlers.insert(method, verbs::default_handler(method));
        }
        resource
    }

    pub fn with_handler(mut self, method: Method, handler: VerbHandler) -> Self {
        self.handlers.insert(method, handler);
        self
    }

    pub fn without_handler(mut self, method: Method) -> Self {
        self.handlers.remove(&method);
        self
    }

    pub fn handler(&self, method: Method) -> Option<VerbHandler> {
        self.handlers.get(&method).copied()
    }

    /// Registered verbs in `Allow` header order
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.handlers.keys().copied().collect()
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn type_name(&self) -> &str {
        &self.config.type_name
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("config", &self.config)
            .field("methods", &self.allowed_methods())
            .finish()
    }
}

/// Resources by type name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: BTreeMap<String, Resource>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schema(schema: &Schema, api: &ApiConfig) -> Self {
        let mut registry = Self::new();
        for type_schema in schema.types() {
            let config = ResourceConfig::from_type_schema(type_schema, api);
            registry = registry.with_resource(Resource::with_default_handlers(config));
        }
        registry
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.type_name().to_string(), resource);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&Resource> {
        self.resources.get(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn config_falls_back_to_api_defaults() {
        let api = AppConfig::default().api;
        let mut schema = TypeSchema::new("posts");
        schema.error_scope = 0x100;
        let config = ResourceConfig::from_type_schema(&schema, &api);
        assert_eq!(config.page_size, api.default_page_size);
        assert_eq!(config.error_scope, 0x100);
        assert_eq!(config.methods, Method::ALL.to_vec());

        schema.page_size = Some(1_000_000);
        assert_eq!(ResourceConfig::from_type_schema(&schema, &api).page_size, api.max_page_size);
    }

    #[test]
    fn handlers_follow_declared_methods() {
        let mut config = ResourceConfig::new("comments");
        config.methods = vec![Method::Options, Method::Get];
        let resource = Resource::with_default_handlers(config);
        assert_eq!(resource.allowed_methods(), vec![Method::Get, Method::Options]);
        assert!(resource.handler(Method::Post).is_none());

        let resource = resource.without_handler(Method::Get);
        assert_eq!(resource.allowed_methods(), vec![Method::Options]);
    }

    #[test]
    fn registry_covers_every_declared_type() {
        let schema = Schema::new().with_type(TypeSchema::new("posts")).with_type(TypeSchema::new("users"));
        let registry = Registry::from_schema(&schema, &AppConfig::default().api);
        assert_eq!(registry.type_names().collect::<Vec<_>>(), vec!["posts", "users"]);
        assert!(registry.get("comments").is_none());
    }
}
