//! Elasticsearch client for document operations
//!
//! Talks to the Elasticsearch REST API directly over HTTP. Failures are
//! reported as [`GatewayError::Elastic`] and never retried.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::query::EngineQuery;
use crate::search_db::{DocumentIndex, RawSearchResponse};

/// Elasticsearch client
pub struct ElasticClient {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

impl ElasticClient {
    /// Create a new Elasticsearch client
    pub fn new(config: &Config) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.elastic_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Elastic(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.elastic_endpoint.trim_end_matches('/').to_string(),
            username: config.elastic_username.clone(),
            password: config.elastic_password.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.endpoint, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);

        if self.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> GatewayResult<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|e| GatewayError::Elastic(format!("{} failed: {}", action, e)))
    }

    async fn fail(response: reqwest::Response, action: &str) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        GatewayError::Elastic(format!("{} failed: {} - {}", action, status, body))
    }
}

#[async_trait]
impl DocumentIndex for ElasticClient {
    async fn search(&self, query: &EngineQuery) -> GatewayResult<RawSearchResponse> {
        let body = query.to_body();
        tracing::debug!(index = %query.index, query = %body, "elastic search");

        let response = self
            .send(
                self.request(Method::POST, &format!("{}/_search", query.index)).json(&body),
                "Search",
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response, "Search").await);
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Elastic(format!("Failed to parse search response: {}", e)))
    }

    async fn get(&self, index: &str, id: &str) -> GatewayResult<Option<Map<String, Value>>> {
        let response = self
            .send(self.request(Method::GET, &format!("{}/_doc/{}", index, id)), "Get")
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::fail(response, "Get").await);
        }

        let result: GetResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Elastic(format!("Failed to parse get response: {}", e)))?;

        Ok(if result.found { result.source } else { None })
    }

    async fn index_document(&self, index: &str, id: &str, source: &Value) -> GatewayResult<String> {
        let response = self
            .send(
                self.request(Method::PUT, &format!("{}/_doc/{}", index, id)).json(source),
                "Index",
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response, "Index").await);
        }

        let result: IndexResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Elastic(format!("Failed to parse index response: {}", e)))?;

        Ok(result.id)
    }

    async fn bulk_index(&self, index: &str, documents: &[(String, Value)]) -> GatewayResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut payload = String::new();
        for (id, source) in documents {
            let action = serde_json::json!({ "index": { "_index": index, "_id": id } });
            payload.push_str(&action.to_string());
            payload.push('\n');
            payload.push_str(&source.to_string());
            payload.push('\n');
        }

        let response = self
            .send(
                self.request(Method::POST, "_bulk?refresh=true")
                    .header("Content-Type", "application/x-ndjson")
                    .body(payload),
                "Bulk",
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response, "Bulk").await);
        }

        let result: BulkResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Elastic(format!("Failed to parse bulk response: {}", e)))?;

        if result.errors {
            let failed = result
                .items
                .iter()
                .filter(|item| item["index"].get("error").is_some())
                .count();
            return Err(GatewayError::Elastic(format!(
                "Bulk failed: {} of {} documents rejected",
                failed,
                documents.len()
            )));
        }

        Ok(documents.len())
    }

    async fn ping(&self) -> bool {
        match self.request(Method::GET, "").send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
