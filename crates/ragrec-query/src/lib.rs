//! Query path for ragrec.
//!
//! ```text
//! value ─► RecommendationService::resolve_query ─► Retriever ─► RerankCoordinator ─► RankedResult
//!            (identifier lookup or raw text)       (embed+search)  (filter, score, sort, truncate)
//! ```
//!
//! [`Manager`] wraps either a [`RecommendationService`] or a [`ReportService`]
//! and is built once at startup.

pub mod manager;
pub mod rerank;
pub mod retriever;
pub mod service;

#[cfg(test)]
mod testing;

pub use manager::{Manager, ManagerKind, ReportService};
pub use rerank::RerankCoordinator;
pub use retriever::Retriever;
pub use service::RecommendationService;
