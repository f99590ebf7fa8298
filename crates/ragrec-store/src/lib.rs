//! Vector storage for ragrec.
//!
//! This crate owns the chunk table and the vector arena, keeps them row
//! aligned, and persists them as a pair.
//!
//! # Components
//!
//! - [`FlatIndex`]: exact search over a contiguous vector arena
//! - [`VectorIndex`]: lock-guarded [`FlatIndex`] bound to a base path
//! - [`artifact`]: the two-file on-disk format and its consistency checks
//!
//! # Example
//!
//! ```rust,ignore
//! use ragrec_store::VectorIndex;
//!
//! let index = VectorIndex::open("data/index").await?;
//! let candidates = index.search(&query_vector, 10).await?;
//! ```

pub mod artifact;
pub mod flat;
pub mod index;

pub use artifact::ArtifactPaths;
pub use flat::FlatIndex;
pub use index::VectorIndex;
