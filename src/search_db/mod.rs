//! Document index access
//!
//! [`DocumentIndex`] is the seam between the gateway and the search engine.
//! Production uses [`ElasticClient`]; tests substitute in-memory fakes.

pub mod elastic_client;

pub use elastic_client::ElasticClient;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::GatewayResult;
use crate::query::EngineQuery;

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Execute a compiled search
    async fn search(&self, query: &EngineQuery) -> GatewayResult<RawSearchResponse>;

    /// Stored fields of one document, `None` when missing
    async fn get(&self, index: &str, id: &str) -> GatewayResult<Option<Map<String, Value>>>;

    /// Index (upsert) one document, returning the engine id
    async fn index_document(&self, index: &str, id: &str, source: &Value) -> GatewayResult<String>;

    /// Index many documents in one refreshing request, returning how many were sent
    async fn bulk_index(&self, index: &str, documents: &[(String, Value)]) -> GatewayResult<usize>;

    /// Whether the engine answers at all
    async fn ping(&self) -> bool;
}

/// Search response as returned by the engine
#[derive(Debug, Clone, Deserialize)]
pub struct RawSearchResponse {
    pub hits: RawHits,
    #[serde(default)]
    pub aggregations: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHits {
    #[serde(default)]
    pub total: Option<RawTotal>,
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTotal {
    pub value: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}
