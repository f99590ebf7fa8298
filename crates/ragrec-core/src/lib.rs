//! # ragrec-core
//!
//! Core types and traits for ragrec, a retrieval-augmented recommendation engine.
//!
//! This crate provides the shared vocabulary used by every other crate in the
//! workspace:
//!
//! - **Chunk records**: [`ChunkRecord`] rows that live in the chunk table
//! - **Candidates**: [`Candidate`] and [`RankedResult`] produced per query
//! - **Collaborators**: [`Embedder`], [`Reranker`] and [`Generator`] traits
//!   implemented by external model services
//! - **Errors**: the [`Error`] taxonomy shared by the index, the query path
//!   and the batch pipelines
//!
//! ## Architecture
//!
//! ```text
//! ingestion:  rows → chunker → Embedder → VectorIndex.add → save
//!
//! query:      text → Embedder → VectorIndex.search → Reranker → RankedResult
//!                                                                  ↓
//!                                                              Generator
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChunkRecord`] | Source metadata plus chunk text, one row of the chunk table |
//! | [`Candidate`] | A chunk returned by similarity search, optionally reranked |
//! | [`RankedResult`] | Final top-k candidates plus the query that produced them |
//! | [`DistanceMetric`] | Similarity function fixed at index creation |
//! | [`ColumnMapping`] | Which chunk columns act as identifier, category and target |
//! | [`InputMode`] | Numeric codes accepted for the recommendation input type |

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    EmbedError, Error, GenerateError, RerankError, Result, StoreError, ValidationError,
};
pub use traits::*;
pub use types::*;
