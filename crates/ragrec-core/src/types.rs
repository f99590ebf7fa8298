//! Core types for ragrec.
//!
//! ## Chunk table
//! - [`ChunkRecord`]: one row of source metadata plus chunk text
//! - [`ColumnMapping`]: column names used for lookup, filtering and reranking
//!
//! ## Search
//! - [`DistanceMetric`]: similarity function fixed at index creation
//! - [`Candidate`]: a retrieved row with its similarity and optional rerank score
//! - [`RankedResult`]: the final, truncated candidate list
//!
//! ## Requests
//! - [`InputType`] / [`InputMode`]: how the recommendation input is interpreted
//!
//! ## Configuration
//! - [`ChunkConfig`]: splitter window and overlap
//! - [`EmbeddingConfig`]: embedding request options

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ============================================================================
// Chunk Records
// ============================================================================

/// A chunk of a source document together with its source metadata.
///
/// Records carry no identifier: a record's position in the chunk table is its
/// identity, and that position always matches the row of its vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Source domain (also the default category column)
    pub domain: String,
    /// Source file name
    pub file_name: String,
    /// Source URL or other source tag
    pub url: String,
    /// The chunk content
    pub text: String,
    /// Additional columns copied from the ingestion table
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ChunkRecord {
    /// Create a record with no extra columns.
    pub fn new(
        domain: impl Into<String>,
        file_name: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            file_name: file_name.into(),
            url: url.into(),
            text: text.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra column.
    #[must_use]
    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(column.into(), value.into());
        self
    }

    /// Read a column by name.
    ///
    /// The four fixed columns resolve to their fields; any other name is
    /// looked up in [`ChunkRecord::extra`].
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "domain" => Some(&self.domain),
            "file_name" => Some(&self.file_name),
            "url" => Some(&self.url),
            "text" | "chunk" => Some(&self.text),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}

/// Column names the recommendation path reads from chunk records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Column holding the entity identifier used for identifier lookups
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Column compared against the category filter
    #[serde(default = "default_category_column")]
    pub category_column: String,
    /// Column used as query text and as reranker input
    #[serde(default = "default_target_column")]
    pub target_column: String,
}

fn default_id_column() -> String {
    "file_name".to_string()
}

fn default_category_column() -> String {
    "domain".to_string()
}

fn default_target_column() -> String {
    "text".to_string()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
            category_column: default_category_column(),
            target_column: default_target_column(),
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Distance metric for vector search.
///
/// The metric is fixed when an index is created and persisted with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Dot product, higher is closer. Equivalent to cosine on unit vectors.
    #[default]
    InnerProduct,
    /// Squared Euclidean distance, lower is closer.
    L2,
    /// Cosine similarity, higher is closer.
    Cosine,
}

impl DistanceMetric {
    /// Score `b` against the query `a`.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::InnerProduct => dot(a, b),
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            Self::Cosine => {
                let norm_a = dot(a, a).sqrt();
                let norm_b = dot(b, b).sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot(a, b) / (norm_a * norm_b)
            }
        }
    }

    /// Order two scores so that the closer one comes first.
    pub fn compare(self, a: f32, b: f32) -> Ordering {
        match self {
            Self::L2 => a.total_cmp(&b),
            Self::InnerProduct | Self::Cosine => b.total_cmp(&a),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InnerProduct => "inner_product",
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// A chunk returned by similarity search.
///
/// Created per query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Row of this chunk in the index
    pub row: usize,
    /// The chunk record at that row
    pub record: ChunkRecord,
    /// Similarity score under the index metric
    pub score: f32,
    /// Relevance score assigned by the reranker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Candidate {
    /// Read a column of the underlying record.
    pub fn field(&self, column: &str) -> Option<&str> {
        self.record.field(column)
    }
}

/// Final ranked candidates for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// The query text the candidates were ranked against
    pub query: String,
    /// Candidates sorted by descending rerank score, truncated to top-k
    pub candidates: Vec<Candidate>,
}

/// Index statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of rows (vectors and chunk records)
    pub rows: usize,
    /// Vector dimension
    pub dimension: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Combined size of the persisted artifacts in bytes
    pub size_bytes: u64,
    /// When the artifacts were last written
    pub saved_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Requests
// ============================================================================

/// How a recommendation input value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// The value is an entity identifier resolved through the chunk table
    Identifier,
    /// The value is used verbatim as query text
    Text,
}

/// Numeric codes accepted for [`InputType`] on external interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMode {
    /// Code selecting [`InputType::Identifier`]
    #[serde(default)]
    pub identifier: i64,
    /// Code selecting [`InputType::Text`]
    #[serde(default = "default_text_code")]
    pub text: i64,
}

fn default_text_code() -> i64 {
    1
}

impl Default for InputMode {
    fn default() -> Self {
        Self {
            identifier: 0,
            text: default_text_code(),
        }
    }
}

impl InputMode {
    /// Map a numeric code to an input type.
    pub fn resolve(&self, code: i64) -> Result<InputType, ValidationError> {
        if code == self.identifier {
            Ok(InputType::Identifier)
        } else if code == self.text {
            Ok(InputType::Text)
        } else {
            Err(self.reject(code.to_string()))
        }
    }

    /// Parse a code or a name (`id`, `identifier`, `text`).
    pub fn parse(&self, value: &str) -> Result<InputType, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" | "identifier" => Ok(InputType::Identifier),
            "text" => Ok(InputType::Text),
            other => other
                .parse::<i64>()
                .map_err(|_| self.reject(value.to_string()))
                .and_then(|code| self.resolve(code)),
        }
    }

    fn reject(&self, value: String) -> ValidationError {
        ValidationError::InputType {
            value,
            identifier: self.identifier,
            text: self.text,
        }
    }
}

// ============================================================================
// Chunking
// ============================================================================

/// Configuration for chunking, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }
}

impl ChunkConfig {
    /// Reject configurations where the window would never advance.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chunk_size <= self.overlap {
            return Err(ValidationError::ChunkConfig {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Embedding
// ============================================================================

/// Configuration for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Normalize embeddings to unit length
    pub normalize: bool,
    /// Texts per embedding request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            batch_size: 32,
        }
    }
}

/// Output from embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Number of tokens in input
    pub token_count: usize,
}
