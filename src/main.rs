//! Search Gateway Service - Main Entry Point
//!
//! Compiles declarative filter/sort/aggregate/boost search requests into
//! Elasticsearch queries and shapes the results into paginated envelopes.

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod models;
mod query;
mod search_db;
mod services;
mod handlers;

use config::Config;
use handlers::AppState;
use search_db::{DocumentIndex, ElasticClient};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "search_gateway=info,tower_http=debug".into()),
    );

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(config.log_json);

    info!("🔎 Starting Search Gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Port: {}", config.port);

    // Elasticsearch client; the connection is long-lived and shared by all requests
    let elastic = ElasticClient::new(&config)?;
    if elastic.ping().await {
        info!("✅ Elasticsearch reachable at {}", config.elastic_endpoint);
    } else {
        tracing::warn!(
            "⚠️ Elasticsearch not reachable at {}. Searches will fail until it is.",
            config.elastic_endpoint
        );
    }

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        index: Arc::new(elastic),
    });

    // Build HTTP routes
    let app = handlers::routes(state)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("🚀 Search Gateway listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
