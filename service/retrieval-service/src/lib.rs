pub mod fusion;
pub mod keyword;
pub mod vector_search;

use std::sync::Arc;

use embedding_provider::embedder::Embedder;
use search_model::SearchResult;
use tracing::{info, warn};
use vector_store::{FilterClause, LocalVectorStore};

use crate::fusion::{fuse_results, rerank, RankingConfig};
use crate::keyword::LexicalSearcher;
use crate::vector_search::VectorSearch;

/// Upper bound on the caller-requested result count.
pub const MAX_TOP_K: usize = 50;
/// Allowed deviation of `vector_weight + keyword_weight` from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval weights must lie in [0, 1] and sum to 1.0: vector={vector}, keyword={keyword}")]
    InvalidWeights { vector: f64, keyword: f64 },
    #[error("top_k out of range: {0} (allowed 1..={MAX_TOP_K})")]
    InvalidTopK(usize),
    #[error("embedder error: {0}")]
    Embed(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("keyword search error: {0}")]
    Keyword(String),
}

/// Tunables for one retrieval pipeline instance.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub vector_weight: f64,
    pub keyword_weight: f64,
    /// Candidate count handed to fusion/rerank; larger than `final_top_k`
    /// so the rerank stage has material to work with.
    pub rerank_top_k: usize,
    pub final_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { vector_weight: 0.7, keyword_weight: 0.3, rerank_top_k: 50, final_top_k: 10 }
    }
}

/// Reject bad weights before any I/O happens.
pub fn validate_weights(vector_weight: f64, keyword_weight: f64) -> Result<(), RetrievalError> {
    let in_range =
        (0.0..=1.0).contains(&vector_weight) && (0.0..=1.0).contains(&keyword_weight);
    let sums = ((vector_weight + keyword_weight) - 1.0).abs() <= WEIGHT_SUM_TOLERANCE;
    if in_range && sums {
        Ok(())
    } else {
        Err(RetrievalError::InvalidWeights { vector: vector_weight, keyword: keyword_weight })
    }
}

fn validate_top_k(top_k: usize) -> Result<(), RetrievalError> {
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(RetrievalError::InvalidTopK(top_k));
    }
    Ok(())
}

/// Seam for the lexical retrieval path so callers (and tests) can substitute
/// their own scorer. The default is [`LexicalSearcher`].
pub trait KeywordSearcher: Send + Sync {
    fn search(
        &self,
        query: &str,
        filters: &[FilterClause],
        limit: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError>;
}

/// Hybrid retrieval orchestrator: vector and lexical candidate generation,
/// weighted fusion, reranking.
///
/// Failure policy: after argument validation nothing raises. A failed
/// keyword path degrades to vector-only search; if the vector path also
/// produces nothing, the caller gets an empty list.
pub struct HybridRetrieval {
    vector: VectorSearch,
    keyword: Box<dyn KeywordSearcher>,
    ranking: RankingConfig,
    config: RetrievalConfig,
}

impl HybridRetrieval {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<LocalVectorStore>) -> Self {
        let vector = VectorSearch::new(embedder, store);
        let keyword = Box::new(LexicalSearcher::new(vector.clone()));
        Self { vector, keyword, ranking: RankingConfig::default(), config: RetrievalConfig::default() }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Result<Self, RetrievalError> {
        validate_weights(config.vector_weight, config.keyword_weight)?;
        validate_top_k(config.final_top_k)?;
        self.config = config;
        Ok(self)
    }

    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    /// Replace the lexical path implementation.
    pub fn with_keyword_searcher(mut self, keyword: Box<dyn KeywordSearcher>) -> Self {
        self.keyword = keyword;
        self
    }

    /// The vector adapter, exposed for ingestion and deletion.
    pub fn vector(&self) -> &VectorSearch {
        &self.vector
    }

    /// Run the full pipeline with this instance's configured weights.
    pub fn search(
        &self,
        query: &str,
        filters: &[FilterClause],
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        let cfg = self.config.clone();
        self.search_with(query, filters, cfg.vector_weight, cfg.keyword_weight, cfg.final_top_k)
    }

    /// Run the full pipeline with per-call weights and result count.
    pub fn search_with(
        &self,
        query: &str,
        filters: &[FilterClause],
        vector_weight: f64,
        keyword_weight: f64,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        validate_weights(vector_weight, keyword_weight)?;
        validate_top_k(top_k)?;

        let vector_results = self.vector.search(query, filters, self.config.rerank_top_k);
        let keyword_results =
            match self.keyword.search(query, filters, self.config.rerank_top_k) {
                Ok(results) => results,
                Err(err) => {
                    warn!(error = %err, "keyword search failed, degrading to vector-only");
                    Vec::new()
                }
            };
        info!(
            vector = vector_results.len(),
            keyword = keyword_results.len(),
            "candidate generation finished"
        );

        let fused = fuse_results(vector_results, keyword_results, vector_weight, keyword_weight);
        let mut reranked = rerank(fused, query, &self.ranking);
        reranked.truncate(top_k);
        Ok(reranked)
    }
}
