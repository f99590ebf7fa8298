//! # ragrec-embed
//!
//! Embedding plumbing for ragrec.
//!
//! Every type here implements [`ragrec_core::Embedder`], so they stack:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragrec_embed::{EmbedderPool, EmbeddingCache};
//! use ragrec_remote::OpenAiEmbedder;
//!
//! let remote = Arc::new(OpenAiEmbedder::new(&settings, 1024)?);
//! let cached = Arc::new(EmbeddingCache::new(remote));
//! let pool = EmbedderPool::new(cached, 4);
//! let vectors = pool.embed_all(&texts, &config).await?;
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EmbedderPool`] | Batched embedding with semaphore-bounded concurrency |
//! | [`EmbeddingCache`] | blake3-keyed LRU memoisation |
//! | [`HashingEmbedder`] | Deterministic feature-hashing embedder, no model required |

pub mod cache;
pub mod hashing;
pub mod pool;

pub use cache::{CacheStats, EmbeddingCache};
pub use hashing::HashingEmbedder;
pub use pool::EmbedderPool;
