//! Shared models used across crates

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which retrieval path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Vector,
    Keyword,
    /// Confirmed by both the vector and the keyword path.
    Hybrid,
}

/// A ranked knowledge fragment returned to callers.
///
/// `score` is comparable only within one query's result set; fusion and
/// reranking adjust it in place as the pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub title: String,
    pub score: f64,
    pub source_type: SourceType,
    pub document_id: String,
    pub chunk_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub relevance_explanation: String,
}

impl SearchResult {
    /// Uniqueness key across the whole pipeline: two results with the same
    /// fusion key must never both appear in a final result list.
    pub fn fusion_key(&self) -> (&str, &str) {
        (&self.document_id, &self.chunk_id)
    }

    /// String metadata lookup; numbers and other JSON values fall back to
    /// their display form.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Ingest-side unit: one fragment of a knowledge document, before it is
/// embedded and stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DocumentChunk {
    pub fn new(content: impl Into<String>, title: impl Into<String>) -> Self {
        Self { content: content.into(), title: title.into(), metadata: Map::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
