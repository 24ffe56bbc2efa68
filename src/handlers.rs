//! HTTP handlers module

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::config::Config;
use crate::error::GatewayError;
use crate::models::*;
use crate::search_db::DocumentIndex;
use crate::services::SearchService;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub index: Arc<dyn DocumentIndex>,
}

impl AppState {
    fn service(&self) -> SearchService {
        SearchService::new(self.config.clone(), self.index.clone())
    }
}

/// Route table for the gateway
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Search (main query API)
        .route("/api/v1/elastic/search", post(search))

        // Documents
        .route("/api/v1/elastic/set", post(set_document))
        .route("/api/v1/elastic/sets", post(set_documents))
        .route("/api/v1/elastic/:index/:id", get(get_document))

        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let elastic_status = state.service().index_available().await;

    Json(serde_json::json!({
        "status": if elastic_status { "healthy" } else { "degraded" },
        "service": "search-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "components": {
            "elasticsearch": elastic_status,
        },
        "default_index": state.config.default_index,
    }))
}

/// Compile and run a declarative search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, GatewayError> {
    let response = state.service().search(request).await?;

    Ok(Json(response))
}

/// Get one document by ID
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((index, id)): Path<(String, String)>,
) -> Result<Json<GetDocumentResponse>, GatewayError> {
    let response = state.service().get_document(&index, &id).await?;

    Ok(Json(response))
}

/// Index one document
pub async fn set_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetDocumentRequest>,
) -> Result<Json<SetDocumentResponse>, GatewayError> {
    let response = state.service().set_document(request).await?;

    Ok(Json(response))
}

/// Bulk index documents
pub async fn set_documents(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetDocumentsRequest>,
) -> Result<Json<SetDocumentsResponse>, GatewayError> {
    let response = state.service().set_documents(request).await?;

    Ok(Json(response))
}
