//! Error types for ragrec.
//!
//! A "no match" outcome (unknown identifier, empty post-filter candidate set)
//! is not an error: it is reported as `Ok(None)` by the query path.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for ragrec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied input or configuration was rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Embedding collaborator failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Reranker collaborator failed
    #[error("rerank error: {0}")]
    Rerank(#[from] RerankError),

    /// Generator collaborator failed
    #[error("generation error: {0}")]
    Generation(#[from] GenerateError),

    /// Index persistence failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Tabular input or output could not be read or written
    #[error("table error: {0}")]
    Table(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Input validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid input_type {value}; use {identifier} or {text}")]
    InputType {
        value: String,
        identifier: i64,
        text: i64,
    },

    #[error("vector dimension must be greater than zero")]
    ZeroDimension,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("chunk_size ({chunk_size}) must be greater than overlap ({overlap})")]
    ChunkConfig { chunk_size: usize, overlap: usize },

    #[error("{vectors} vectors supplied for {records} chunk records")]
    RowCountMismatch { vectors: usize, records: usize },

    #[error("{manager} manager does not support {capability}")]
    UnsupportedCapability {
        manager: &'static str,
        capability: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Embedding collaborator errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Reranker collaborator errors.
#[derive(Error, Debug)]
pub enum RerankError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("reranker returned {actual} scores for {expected} candidates")]
    ScoreCount { expected: usize, actual: usize },
}

/// Generator collaborator errors.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Vector index persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("missing index artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("corrupt index artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("index artifacts disagree: {0}")]
    Mismatch(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task join error: {0}")]
    Task(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ragrec operations.
pub type Result<T> = std::result::Result<T, Error>;
