//! Deterministic offline embedder.
//!
//! [`HashingEmbedder`] maps each lowercase alphanumeric token to a bucket and a
//! sign with blake3 (the feature-hashing trick). Texts that share tokens get
//! similar vectors, identical texts get identical vectors, and no model or
//! network is involved. It backs dry runs and tests.

use async_trait::async_trait;
use ragrec_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};

/// Feature-hashing embedder.
///
/// # Example
///
/// ```rust
/// use ragrec_embed::HashingEmbedder;
/// use ragrec_core::{Embedder, EmbeddingConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = HashingEmbedder::new(64);
/// let config = EmbeddingConfig::default();
/// let outputs = embedder.embed_text(&["red apple", "green apple"], &config).await?;
///
/// assert_eq!(outputs.len(), 2);
/// assert_eq!(outputs[0].embedding.len(), 64);
/// assert_eq!(outputs[0].token_count, 2);
/// # Ok(())
/// # }
/// ```
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` floats.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str, normalize: bool) -> EmbeddingOutput {
        let mut embedding = vec![0.0f32; self.dimension];
        let mut token_count = 0;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            token_count += 1;
            if self.dimension == 0 {
                continue;
            }
            let hash = blake3::hash(token.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]);
            #[allow(clippy::cast_possible_truncation)]
            let slot = (bucket % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[slot] += sign;
        }

        if normalize {
            let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        EmbeddingOutput {
            embedding,
            token_count,
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| self.embed_one(text, config.normalize))
            .collect())
    }
}
