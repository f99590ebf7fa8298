//! Shared, persistent vector index.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ragrec_core::{
    Candidate, ChunkRecord, DistanceMetric, IndexStats, StoreError, ValidationError,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::artifact::{self, ArtifactPaths};
use crate::flat::FlatIndex;

#[derive(Debug)]
struct State {
    flat: FlatIndex,
    saved_at: Option<DateTime<Utc>>,
}

/// Vector index and chunk table persisted together under one base path.
///
/// Searches and lookups share a read lock. `add`, `save` and `load` take the
/// write lock, so they exclude each other and every concurrent reader.
///
/// # Example
///
/// ```rust
/// use ragrec_core::{ChunkRecord, DistanceMetric};
/// use ragrec_store::VectorIndex;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let index = VectorIndex::new("/tmp/ragrec/index", 2, DistanceMetric::InnerProduct)?;
/// index
///     .add(
///         vec![ChunkRecord::new("docs", "a.txt", "file://a.txt", "hello")],
///         vec![vec![1.0, 0.0]],
///     )
///     .await?;
///
/// let hits = index.search(&[1.0, 0.0], 5).await?;
/// assert_eq!(hits.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct VectorIndex {
    base_path: PathBuf,
    paths: ArtifactPaths,
    state: RwLock<State>,
}

impl VectorIndex {
    /// Create an empty, unsaved index.
    ///
    /// Fails if `dimension` is zero.
    pub fn new(
        base_path: impl Into<PathBuf>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self, ValidationError> {
        let base_path = base_path.into();
        Ok(Self {
            paths: ArtifactPaths::from_base(&base_path),
            base_path,
            state: RwLock::new(State {
                flat: FlatIndex::new(dimension, metric)?,
                saved_at: None,
            }),
        })
    }

    /// Open the index persisted at `base_path`.
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        let paths = ArtifactPaths::from_base(&base_path);
        let (flat, saved_at) = load_blocking(paths.clone()).await?;
        info!(
            "Loaded index {:?} ({} rows, dimension {}, {})",
            base_path,
            flat.len(),
            flat.dimension(),
            flat.metric()
        );
        Ok(Self {
            base_path,
            paths,
            state: RwLock::new(State {
                flat,
                saved_at: Some(saved_at),
            }),
        })
    }

    /// Open the persisted index, or create an empty one if nothing is persisted.
    ///
    /// A persisted index whose dimension or metric differs from the requested
    /// one is rejected.
    pub async fn open_or_create(
        base_path: impl Into<PathBuf>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        if !ArtifactPaths::from_base(&base_path).exists() {
            debug!("No index at {:?}, starting empty", base_path);
            return Ok(Self::new(base_path, dimension, metric)?);
        }

        let index = Self::open(base_path).await?;
        index.ensure_shape(dimension, metric).await?;
        Ok(index)
    }

    /// Fail unless the index has the given dimension and metric.
    pub async fn ensure_shape(
        &self,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<(), StoreError> {
        let (found_dimension, found_metric) = {
            let state = self.state.read().await;
            (state.flat.dimension(), state.flat.metric())
        };
        if found_dimension != dimension || found_metric != metric {
            return Err(StoreError::Mismatch(format!(
                "index at {:?} is {} / {}, configured {} / {}",
                self.base_path, found_dimension, found_metric, dimension, metric
            )));
        }
        Ok(())
    }

    /// Base path shared by both artifacts.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Vector dimension.
    pub async fn dimension(&self) -> usize {
        self.state.read().await.flat.dimension()
    }

    /// Distance metric.
    pub async fn metric(&self) -> DistanceMetric {
        self.state.read().await.flat.metric()
    }

    /// Number of rows.
    pub async fn len(&self) -> usize {
        self.state.read().await.flat.len()
    }

    /// Whether the index holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.flat.is_empty()
    }

    /// Append aligned chunk records and vectors.
    ///
    /// Returns the row of the first appended record. The batch is rejected
    /// as a whole if any vector has the wrong dimension.
    pub async fn add(
        &self,
        records: Vec<ChunkRecord>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, ValidationError> {
        let mut state = self.state.write().await;
        state.flat.add(records, vectors)
    }

    /// Up to `k` nearest rows to `query`, closest first.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>, ValidationError> {
        let state = self.state.read().await;
        let results = state.flat.search(query, k)?;
        debug!("Search returned {} of {} rows", results.len(), state.flat.len());
        Ok(results)
    }

    /// First chunk record whose `column` equals `value`.
    pub async fn find_first(&self, column: &str, value: &str) -> Option<ChunkRecord> {
        let state = self.state.read().await;
        state
            .flat
            .find_first(column, value)
            .map(|(_, record)| record.clone())
    }

    /// Persist both artifacts to the base path.
    ///
    /// The previously persisted index stays loadable if the save fails.
    pub async fn save(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let encoded = artifact::encode(&state.flat, &self.paths)?;
        let saved_at = encoded.saved_at;
        let paths = self.paths.clone();
        tokio::task::spawn_blocking(move || artifact::write(&encoded, &paths))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
        state.saved_at = Some(saved_at);
        info!("Saved index {:?} ({} rows)", self.base_path, state.flat.len());
        Ok(())
    }

    /// Replace the in-memory state with the persisted artifacts.
    ///
    /// On failure the in-memory state is left untouched.
    pub async fn load(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let (flat, saved_at) = load_blocking(self.paths.clone()).await?;
        info!("Reloaded index {:?} ({} rows)", self.base_path, flat.len());
        *state = State {
            flat,
            saved_at: Some(saved_at),
        };
        Ok(())
    }

    /// Index statistics.
    pub async fn stats(&self) -> IndexStats {
        let mut stats = {
            let state = self.state.read().await;
            IndexStats {
                rows: state.flat.len(),
                dimension: state.flat.dimension(),
                metric: state.flat.metric(),
                size_bytes: 0,
                saved_at: state.saved_at,
            }
        };
        let paths = self.paths.clone();
        stats.size_bytes = tokio::task::spawn_blocking(move || paths.size_bytes())
            .await
            .unwrap_or_default();
        stats
    }
}

async fn load_blocking(
    paths: ArtifactPaths,
) -> Result<(FlatIndex, DateTime<Utc>), StoreError> {
    tokio::task::spawn_blocking(move || artifact::load(&paths))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
