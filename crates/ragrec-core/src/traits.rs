//! Collaborator traits.
//!
//! The engine never talks to a model directly. It receives vectors and scores
//! through these traits:
//!
//! - [`Embedder`]: text to fixed-length vector
//! - [`Reranker`]: (query, candidate texts) to one relevance score per candidate
//! - [`Generator`]: prompt to free text
//!
//! Implementations surface their failures unchanged; the engine never retries
//! or substitutes a fallback for a failed collaborator call.

use async_trait::async_trait;

use crate::error::{EmbedError, GenerateError, RerankError};
use crate::types::{EmbeddingConfig, EmbeddingOutput};

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one output per input in input order.
    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError>;

    /// Embed a single query.
    async fn embed_query(
        &self,
        query: &str,
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingOutput, EmbedError> {
        let results = self.embed_text(&[query], config).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("empty embedding result".to_string()))
    }
}

// ============================================================================
// Reranking
// ============================================================================

/// Trait for query-aware relevance scoring.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Score each document against the query.
    ///
    /// Returns exactly one score per document, in document order.
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, RerankError>;
}

// ============================================================================
// Generation
// ============================================================================

/// Trait for free-text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}
