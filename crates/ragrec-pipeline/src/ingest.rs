//! Batch ingestion: chunk, embed, append, persist.

use std::path::Path;
use std::sync::Arc;

use ragrec_chunker::FixedSizeChunker;
use ragrec_core::{ChunkConfig, ChunkRecord, EmbeddingConfig, Result};
use ragrec_embed::EmbedderPool;
use ragrec_store::VectorIndex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::table::{SourceRow, read_sources};

/// Configuration for the ingestor.
#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    /// Chunk configuration
    pub chunk_config: ChunkConfig,
    /// Embedding configuration
    pub embed_config: EmbeddingConfig,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Source rows read
    pub rows_read: usize,
    /// Source rows dropped for having no text
    pub rows_skipped: usize,
    /// Chunk rows appended to the index
    pub chunks_added: usize,
    /// Row of the first appended chunk
    pub first_row: usize,
}

/// Splits source rows into chunks, embeds them and appends them to the index.
pub struct Ingestor {
    index: Arc<VectorIndex>,
    embedder: Arc<EmbedderPool>,
    chunker: FixedSizeChunker,
    embed_config: EmbeddingConfig,
}

impl Ingestor {
    /// Create an ingestor. Fails if the chunk configuration is invalid.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<EmbedderPool>,
        config: IngestConfig,
    ) -> Result<Self> {
        Ok(Self {
            index,
            embedder,
            chunker: FixedSizeChunker::new(config.chunk_config)?,
            embed_config: config.embed_config,
        })
    }

    /// Ingest `rows` and save the index once.
    ///
    /// Chunks are embedded in input order and appended together, so a failed
    /// embedding leaves the index and its artifacts untouched.
    pub async fn ingest(&self, rows: Vec<SourceRow>) -> Result<IngestReport> {
        let rows_read = rows.len();
        let mut rows_skipped = 0;
        let mut records = Vec::new();

        for row in rows {
            if row.text.trim().is_empty() {
                warn!("Skipping {} ({}): no text", row.file_name, row.url);
                rows_skipped += 1;
                continue;
            }
            let chunks = self.chunker.split(&row.text);
            debug!("Split {} into {} chunks", row.file_name, chunks.len());
            records.extend(chunks.into_iter().map(|chunk| ChunkRecord {
                domain: row.domain.clone(),
                file_name: row.file_name.clone(),
                url: row.url.clone(),
                text: chunk.content,
                extra: row.extra.clone(),
            }));
        }

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let vectors: Vec<Vec<f32>> = self
            .embedder
            .embed_all(&texts, &self.embed_config)
            .await?
            .into_iter()
            .map(|output| output.embedding)
            .collect();

        let chunks_added = records.len();
        let first_row = self.index.add(records, vectors).await?;
        self.index.save().await?;

        info!(
            "Ingested {} chunks from {} rows ({} skipped) into {:?}",
            chunks_added,
            rows_read,
            rows_skipped,
            self.index.base_path()
        );
        Ok(IngestReport {
            rows_read,
            rows_skipped,
            chunks_added,
            first_row,
        })
    }

    /// Read a CSV source table and ingest it.
    pub async fn ingest_csv(&self, path: &Path) -> Result<IngestReport> {
        let rows = read_sources(path)?;
        self.ingest(rows).await
    }
}
