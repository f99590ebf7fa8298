//! Embedding cache keyed by content hash.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragrec_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum number of entries in the cache.
const DEFAULT_CACHE_SIZE: usize = 10_000;

#[derive(Clone)]
struct CacheEntry {
    output: EmbeddingOutput,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<blake3::Hash, CacheEntry>,
    clock: u64,
    stats: CacheStats,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Drop least recently used entries until `incoming` more fit.
    fn make_room(&mut self, max_size: usize, incoming: usize) {
        let target = max_size.saturating_sub(incoming);
        if self.entries.len() <= target {
            return;
        }
        let mut by_age: Vec<(blake3::Hash, u64)> = self
            .entries
            .iter()
            .map(|(k, v)| (*k, v.last_used))
            .collect();
        by_age.sort_by_key(|(_, last_used)| *last_used);

        let excess = self.entries.len() - target;
        for (key, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
            self.stats.evictions += 1;
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries evicted
    pub evictions: u64,
}

/// Embedder wrapper that memoises outputs with LRU eviction.
///
/// Entries are keyed by a blake3 hash of the text and the normalization flag,
/// so the same text embedded with and without normalization is cached
/// separately.
pub struct EmbeddingCache {
    embedder: Arc<dyn Embedder>,
    state: RwLock<CacheState>,
    max_size: usize,
}

impl EmbeddingCache {
    /// Create a new embedding cache with default size.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_capacity(embedder, DEFAULT_CACHE_SIZE)
    }

    /// Create a new embedding cache with specified capacity.
    pub fn with_capacity(embedder: Arc<dyn Embedder>, max_size: usize) -> Self {
        Self {
            embedder,
            state: RwLock::new(CacheState::default()),
            max_size: max_size.max(1),
        }
    }

    fn key(text: &str, config: &EmbeddingConfig) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[u8::from(config.normalize)]);
        hasher.update(text.as_bytes());
        hasher.finalize()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.state.read().await.stats.clone()
    }

    /// Number of cached entries.
    pub async fn size(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Clear the cache.
    pub async fn clear(&self) {
        self.state.write().await.entries.clear();
    }
}

#[async_trait]
impl Embedder for EmbeddingCache {
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
        let keys: Vec<blake3::Hash> = texts.iter().map(|t| Self::key(t, config)).collect();
        let mut results: Vec<Option<EmbeddingOutput>> = Vec::with_capacity(texts.len());
        let mut missing_texts = Vec::new();
        let mut missing_slots = Vec::new();

        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            for (slot, key) in keys.iter().enumerate() {
                let now = state.tick();
                if let Some(entry) = state.entries.get_mut(key) {
                    entry.last_used = now;
                    let output = entry.output.clone();
                    state.stats.hits += 1;
                    results.push(Some(output));
                } else {
                    state.stats.misses += 1;
                    missing_texts.push(texts[slot]);
                    missing_slots.push(slot);
                    results.push(None);
                }
            }
        }

        if !missing_texts.is_empty() {
            debug!("Cache miss for {} texts, embedding", missing_texts.len());
            let fresh = self.embedder.embed_text(&missing_texts, config).await?;
            if fresh.len() != missing_texts.len() {
                return Err(EmbedError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    missing_texts.len(),
                    fresh.len()
                )));
            }

            let mut guard = self.state.write().await;
            let state = &mut *guard;
            state.make_room(self.max_size, fresh.len().min(self.max_size));
            for (slot, output) in missing_slots.into_iter().zip(fresh) {
                if state.entries.len() < self.max_size {
                    let last_used = state.tick();
                    state.entries.insert(
                        keys[slot],
                        CacheEntry {
                            output: output.clone(),
                            last_used,
                        },
                    );
                }
                results[slot] = Some(output);
            }
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| EmbedError::Inference("missing cached embedding".to_string())))
            .collect()
    }
}
