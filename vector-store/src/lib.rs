pub mod local_store;

pub use local_store::LocalVectorStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One persisted fragment: the embedding's sidecar record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub vector_id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: String,
}

/// A record returned from similarity search, augmented with its cosine
/// similarity against the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub similarity: f32,
}

// ------------------------------
// Filters and query options
// ------------------------------

/// Equality filters applied at candidate-generation time. Conjunctive.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    DocIdEq(String),
    MetaEq { key: String, value: String },
}

impl FilterClause {
    pub fn meta_eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        FilterClause::MetaEq { key: key.into(), value: value.into() }
    }

    pub fn matches(&self, record: &VectorRecord) -> bool {
        match self {
            FilterClause::DocIdEq(doc_id) => record.document_id == *doc_id,
            FilterClause::MetaEq { key, value } => match record.metadata.get(key) {
                Some(Value::String(s)) => s == value,
                Some(other) => other.to_string() == *value,
                None => false,
            },
        }
    }
}

/// Aggregate counters. Derived state: always equals the count of live
/// records / distinct document ids in the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub total_vectors: usize,
    pub dimension: usize,
    pub created_at: String,
    pub last_updated: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chunk/vector count mismatch: {chunks} chunks vs {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Cosine similarity with the zero-norm convention: any zero-norm operand
/// yields 0.0 (never a division by zero).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
