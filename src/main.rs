use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jsonapi_fulfiller::api::Registry;
use jsonapi_fulfiller::config::config;
use jsonapi_fulfiller::database::{EntityStore, MemoryStore, PgStore, Schema};
use jsonapi_fulfiller::handlers::{app, AppState};
use jsonapi_fulfiller::is_production;

#[derive(Parser)]
#[command(name = "jsonapi-fulfiller")]
#[command(about = "Serve declared resource types as a JSON:API")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides JSONAPI_PORT / PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Resource declaration file (overrides JSONAPI_RESOURCES)")]
    resources: Option<String>,

    #[arg(long, help = "PostgreSQL URL; the in-memory store is used when unset")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the config singleton reads the environment
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(!is_production!())
        .init();

    let config = config();
    tracing::info!("Starting in {:?} mode", config.environment);

    let resources_path = args.resources.unwrap_or_else(|| config.server.resources_path.clone());
    let schema = Schema::load(&resources_path).with_context(|| format!("loading {}", resources_path))?;
    let registry = Registry::from_schema(&schema, &config.api);

    let store: Arc<dyn EntityStore> = match args.database_url.or_else(|| config.database.url.clone()) {
        Some(url) => Arc::new(
            PgStore::connect(&url, schema, &config.database)
                .await
                .context("connecting to PostgreSQL")?,
        ),
        None => {
            tracing::warn!("No database URL configured; using the in-memory store");
            Arc::new(MemoryStore::new(schema))
        }
    };

    let port = args.port.unwrap_or(config.server.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app(AppState::new(store, registry))).await?;
    Ok(())
}
