//! Similarity retrieval.

use std::sync::Arc;

use ragrec_core::{Candidate, Embedder, EmbeddingConfig, Result};
use ragrec_store::VectorIndex;
use tracing::debug;

/// Embeds a query and returns the `top_k` nearest chunks.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    embedding: EmbeddingConfig,
}

impl Retriever {
    /// Create a retriever returning at most `top_k` candidates per query.
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Use `config` when embedding queries.
    #[must_use]
    pub fn with_embedding_config(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// The index searched by this retriever.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Number of candidates requested per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Candidates for `query`, closest first, without rerank scores.
    ///
    /// Embedding failures propagate unchanged.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Candidate>> {
        let embedding = self.embedder.embed_query(query, &self.embedding).await?;
        let candidates = self.index.search(&embedding.embedding, self.top_k).await?;
        debug!("Retrieved {} candidates", candidates.len());
        Ok(candidates)
    }
}
