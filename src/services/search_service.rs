//! Search service
//!
//! Validates requests, compiles them, runs them against the document index
//! and shapes the results. Also fronts single-document reads and writes.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    check_index, BulkMeta, GetDocumentResponse, SearchRequest, SearchResponse, SetDocumentData,
    SetDocumentRequest, SetDocumentResponse, SetDocumentsRequest, SetDocumentsResponse,
    TimingMeta,
};
use crate::query::{compile, shape};
use crate::search_db::DocumentIndex;

pub struct SearchService {
    config: Config,
    index: Arc<dyn DocumentIndex>,
}

impl SearchService {
    pub fn new(config: Config, index: Arc<dyn DocumentIndex>) -> Self {
        Self { config, index }
    }

    fn resolve_index(&self, index: Option<String>) -> GatewayResult<String> {
        check_index(index.as_deref())?;
        Ok(index.unwrap_or_else(|| self.config.default_index.clone()))
    }

    /// Execute a declarative search
    pub async fn search(&self, request: SearchRequest) -> GatewayResult<SearchResponse> {
        request.validate()?;

        let query = compile(&request, &self.config.default_index);

        // Only the engine round trip is timed.
        let start = Instant::now();
        let raw = self.index.search(&query).await?;
        let took_ms = start.elapsed().as_millis() as u64;

        let response = shape(raw, &request, took_ms);

        tracing::debug!(
            index = %query.index,
            page = request.page,
            limit = request.limit,
            must = query.query.bool_query().must.len(),
            must_not = query.query.bool_query().must_not.len(),
            total = response.meta.total,
            took_ms,
            "search completed"
        );

        Ok(response)
    }

    /// Fetch one document's stored fields
    pub async fn get_document(&self, index: &str, id: &str) -> GatewayResult<GetDocumentResponse> {
        let data = self
            .index
            .get(index, id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("{}/{}", index, id)))?;

        Ok(GetDocumentResponse { data })
    }

    /// Index (upsert) one document
    pub async fn set_document(&self, request: SetDocumentRequest) -> GatewayResult<SetDocumentResponse> {
        let index = self.resolve_index(request.index)?;
        let (id, source) = request.document.into_stored()?;

        let start = Instant::now();
        let id = self.index.index_document(&index, &id, &source).await?;
        let took_ms = start.elapsed().as_millis() as u64;

        tracing::info!(index = %index, id = %id, "document indexed");

        Ok(SetDocumentResponse {
            meta: TimingMeta { took_ms },
            data: SetDocumentData { id },
        })
    }

    /// Index many documents in one refreshing bulk request
    pub async fn set_documents(&self, request: SetDocumentsRequest) -> GatewayResult<SetDocumentsResponse> {
        let index = self.resolve_index(request.index)?;
        let documents = request
            .documents
            .into_iter()
            .map(|document| document.into_stored())
            .collect::<GatewayResult<Vec<_>>>()?;

        let start = Instant::now();
        let count = self.index.bulk_index(&index, &documents).await?;
        let took_ms = start.elapsed().as_millis() as u64;

        tracing::info!(index = %index, count, "documents bulk indexed");

        Ok(SetDocumentsResponse {
            meta: BulkMeta { took_ms, count },
        })
    }

    /// Whether the document index is reachable
    pub async fn index_available(&self) -> bool {
        self.index.ping().await
    }
}
