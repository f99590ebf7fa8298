//! Text chunking for ragrec.
//!
//! Source documents are split into overlapping, fixed-size character windows
//! before embedding. See [`FixedSizeChunker`].

pub mod fixed;

pub use fixed::{ChunkOutput, FixedSizeChunker};
