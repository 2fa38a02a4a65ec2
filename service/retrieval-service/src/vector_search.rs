use std::sync::Arc;

use embedding_provider::embedder::Embedder;
use search_model::{DocumentChunk, SearchResult, SourceType};
use tracing::{info, warn};
use vector_store::{FilterClause, LocalVectorStore, ScoredRecord};

use crate::RetrievalError;

/// Bridges text queries to the vector store: embeds the query once, then
/// asks the store for nearest neighbors. Also carries the ingest-side entry
/// points the surrounding application calls.
#[derive(Clone)]
pub struct VectorSearch {
    embedder: Arc<dyn Embedder>,
    store: Arc<LocalVectorStore>,
}

impl VectorSearch {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<LocalVectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn store(&self) -> &LocalVectorStore {
        &self.store
    }

    /// Dense candidate generation. Embedding or store trouble is logged and
    /// yields an empty candidate set, never an error.
    pub fn search(
        &self,
        query: &str,
        filters: &[FilterClause],
        limit: usize,
    ) -> Vec<SearchResult> {
        let query_vector = match self.embedder.embed(query) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "query embedding failed");
                return Vec::new();
            }
        };
        self.store
            .search_similar(&query_vector, limit, filters)
            .into_iter()
            .map(record_to_result)
            .collect()
    }

    /// Embed one document's fragments and store them. Returns the generated
    /// vector ids in chunk order.
    pub fn index_document(
        &self,
        document_id: &str,
        chunks: &[DocumentChunk],
    ) -> Result<Vec<String>, RetrievalError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| RetrievalError::Embed(e.to_string()))?;
        let ids = self
            .store
            .add_document(document_id, chunks, &vectors)
            .map_err(|e| RetrievalError::Store(e.to_string()))?;
        info!(document_id, chunks = ids.len(), "indexed document");
        Ok(ids)
    }

    /// Drop every stored fragment of `document_id`. Returns `false` both for
    /// a no-op and for a store failure (logged).
    pub fn delete_document(&self, document_id: &str) -> bool {
        match self.store.delete_document(document_id) {
            Ok(deleted) => deleted,
            Err(err) => {
                warn!(document_id, error = %err, "failed to delete document vectors");
                false
            }
        }
    }
}

fn record_to_result(hit: ScoredRecord) -> SearchResult {
    SearchResult {
        content: hit.record.content,
        title: hit.record.title,
        score: f64::from(hit.similarity),
        source_type: SourceType::Vector,
        document_id: hit.record.document_id,
        chunk_id: hit.record.vector_id,
        metadata: hit.record.metadata,
        relevance_explanation: "semantic vector similarity match".to_string(),
    }
}
