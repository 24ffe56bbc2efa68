//! Document models for indexing and lookup

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};

/// A document as submitted for indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    /// Document id; a random UUID is assigned when absent
    #[serde(default)]
    pub id: Option<String>,
    pub site: String,
    pub schema: String,
    #[serde(default)]
    pub url: Option<String>,
    pub data: Map<String, Value>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

fn default_version() -> String { "1".to_string() }

impl IndexDocument {
    /// Resolve defaults and return `(id, source)` ready for the index.
    pub fn into_stored(self) -> GatewayResult<(String, Value)> {
        let id = match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err(GatewayError::Validation("document id cannot be empty".to_string()));
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let now = Utc::now().timestamp_millis();

        let stored = StoredDocument {
            id: id.clone(),
            site: self.site,
            schema: self.schema,
            url: self.url,
            data: self.data,
            version: self.version,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        };

        let source = serde_json::to_value(&stored)
            .map_err(|e| GatewayError::Internal(format!("Failed to encode document: {}", e)))?;

        Ok((id, source))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    id: String,
    site: String,
    schema: String,
    url: Option<String>,
    data: Map<String, Value>,
    version: String,
    created_at: i64,
    updated_at: i64,
}

/// Index (upsert) one document
#[derive(Debug, Deserialize)]
pub struct SetDocumentRequest {
    #[serde(default)]
    pub index: Option<String>,
    pub document: IndexDocument,
}

/// Bulk index documents
#[derive(Debug, Deserialize)]
pub struct SetDocumentsRequest {
    #[serde(default)]
    pub index: Option<String>,
    pub documents: Vec<IndexDocument>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMeta {
    pub took_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SetDocumentData {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SetDocumentResponse {
    pub meta: TimingMeta,
    pub data: SetDocumentData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMeta {
    pub took_ms: u64,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SetDocumentsResponse {
    pub meta: BulkMeta,
}

#[derive(Debug, Serialize)]
pub struct GetDocumentResponse {
    pub data: Map<String, Value>,
}
