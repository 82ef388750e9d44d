#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;

use jsonapi_fulfiller::api::Registry;
use jsonapi_fulfiller::config::AppConfig;
use jsonapi_fulfiller::database::{MemoryStore, Schema};
use jsonapi_fulfiller::handlers::{app, AppState};

pub const CONTENT_TYPE: &str = "application/vnd.api+json";

/// Router over a fresh in-memory store, served on an unused port inside the
/// test's own runtime
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/resources.yaml");
        let schema = Schema::load(path).context("failed to load resources.yaml")?;
        let registry = Registry::from_schema(&schema, &AppConfig::default().api);
        let store = Arc::new(MemoryStore::new(schema));

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let router = app(AppState::new(store.clone(), registry));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self { port, base_url, store, client: reqwest::Client::new() };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn seed(&self, type_name: &str, fields: Value) -> Result<()> {
        self.store.seed(type_name, fields).await?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.get(self.url(path)).send().await?;
        read(res).await
    }

    pub async fn send(&self, method: reqwest::Method, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .request(method, self.url(path))
            .header("content-type", CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await?;
        read(res).await
    }
}

/// Status plus decoded body; an empty body reads as `Value::Null`
async fn read(res: reqwest::Response) -> Result<(StatusCode, Value)> {
    let status = res.status();
    let content_type = res
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(content_type, CONTENT_TYPE, "unexpected content type for {}", res.url());

    let text = res.text().await?;
    let body = if text.is_empty() { Value::Null } else { serde_json::from_str(&text)? };
    Ok((status, body))
}

/// Seed the blog fixture: two users, three posts, three comments
pub async fn seed_blog(server: &TestServer) -> Result<()> {
    use serde_json::json;

    server.seed("users", json!({"name": "ann"})).await?;
    server.seed("users", json!({"name": "bob"})).await?;
    server.seed("posts", json!({"title": "alpha", "status": "open", "score": 3, "author_id": 1})).await?;
    server.seed("posts", json!({"title": "beta", "status": "closed", "score": 1, "author_id": 2})).await?;
    server.seed("posts", json!({"title": "gamma", "status": "open", "score": 2, "author_id": 1})).await?;
    server.seed("comments", json!({"body": "first", "post_id": 1, "author_id": 2})).await?;
    server.seed("comments", json!({"body": "second", "post_id": 1, "author_id": 1})).await?;
    server.seed("comments", json!({"body": "third", "post_id": 3, "author_id": 2})).await?;
    Ok(())
}
