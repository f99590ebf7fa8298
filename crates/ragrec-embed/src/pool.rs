//! Embedder pool for concurrent embedding operations.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use ragrec_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};
use tokio::sync::Semaphore;
use tracing::debug;

/// Embedder wrapper that bounds the number of in-flight embedding calls.
pub struct EmbedderPool {
    embedder: Arc<dyn Embedder>,
    semaphore: Semaphore,
    max_concurrent: usize,
}

impl EmbedderPool {
    /// Create a new embedder pool.
    pub fn new(embedder: Arc<dyn Embedder>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            embedder,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
        }
    }

    /// Get the underlying embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Embed one batch under a permit.
    ///
    /// Fails if the embedder returns a different number of outputs than it
    /// was given texts.
    pub async fn embed_batch(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Inference(format!("semaphore error: {e}")))?;

        let outputs = self.embedder.embed_text(texts, config).await?;
        if outputs.len() != texts.len() {
            return Err(EmbedError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                outputs.len()
            )));
        }
        Ok(outputs)
    }

    /// Embed any number of texts in `config.batch_size` slices.
    ///
    /// Slices run concurrently up to the pool limit. Outputs are returned in
    /// input order and the first failure aborts the whole call.
    pub async fn embed_all(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = config.batch_size.max(1);
        debug!(
            "Embedding {} texts in batches of {} ({} concurrent)",
            texts.len(),
            batch_size,
            self.max_concurrent
        );

        let batches = try_join_all(
            texts
                .chunks(batch_size)
                .map(|batch| self.embed_batch(batch, config)),
        )
        .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    /// Currently available permits.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Maximum concurrent operations.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

#[async_trait]
impl Embedder for EmbedderPool {
    fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        self.embed_all(texts, config).await
    }
}
