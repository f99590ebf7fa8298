//! On-disk layout of a persisted index.
//!
//! An index at base path `B` is two files:
//!
//! - `B.chunks.json`: chunk table plus a header describing the vector file
//! - `B.vectors.<digest>`: bincode-encoded vector arena, named by its blake3
//!   digest
//!
//! The chunk table header names the vector file it was written with and
//! records its row count, dimension, metric and digest. Loading checks every
//! one of them, so a vector file and a chunk table from different saves are
//! rejected instead of being paired.
//!
//! Renaming the chunk table into place is the only commit point of a save.
//! Every save writes a fresh vector file next to the committed one, so a save
//! that fails before the commit leaves the previous pair loadable. Vector
//! files no committed table names are removed after the next commit.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ragrec_core::{ChunkRecord, DistanceMetric, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::flat::FlatIndex;

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 2;

/// Hex characters of the digest kept in a vector file name.
const DIGEST_NAME_LEN: usize = 16;

/// File paths of the artifacts sharing one base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Base path both artifact names derive from
    pub base: PathBuf,
    /// Chunk table file
    pub chunks: PathBuf,
}

impl ArtifactPaths {
    /// Derive the artifact paths from a base path.
    pub fn from_base(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            chunks: with_suffix(base, ".chunks.json"),
        }
    }

    /// Whether a committed index exists, i.e. its chunk table is in place.
    pub fn exists(&self) -> bool {
        self.chunks.exists()
    }

    /// Vector file path for an arena with the given hex digest.
    pub fn vectors_for(&self, digest: &str) -> PathBuf {
        let short: String = digest.chars().take(DIGEST_NAME_LEN).collect();
        with_suffix(&self.base, &format!(".vectors.{short}"))
    }

    /// Every vector file currently on disk for this base path.
    pub fn vector_files(&self) -> Vec<PathBuf> {
        let Some(prefix) = self.vector_prefix() else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(self.dir()) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(&prefix) && !name.ends_with(".tmp")
            })
            .map(|entry| entry.path())
            .collect()
    }

    /// Combined on-disk size of the chunk table and the vector files.
    pub fn size_bytes(&self) -> u64 {
        std::iter::once(self.chunks.clone())
            .chain(self.vector_files())
            .filter_map(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum()
    }

    fn dir(&self) -> PathBuf {
        match self.base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn vector_prefix(&self) -> Option<String> {
        let name = self.base.file_name()?.to_string_lossy();
        Some(format!("{name}.vectors."))
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Serialize)]
struct VectorFileRef<'a> {
    format_version: u32,
    dimension: usize,
    metric: DistanceMetric,
    rows: usize,
    data: &'a [f32],
}

#[derive(Deserialize)]
struct VectorFile {
    format_version: u32,
    dimension: usize,
    metric: DistanceMetric,
    rows: usize,
    data: Vec<f32>,
}

#[derive(Serialize)]
struct ChunkTableRef<'a> {
    format_version: u32,
    dimension: usize,
    metric: DistanceMetric,
    rows: usize,
    vectors_file: &'a str,
    vectors_digest: &'a str,
    saved_at: DateTime<Utc>,
    chunks: &'a [ChunkRecord],
}

#[derive(Deserialize)]
struct ChunkTable {
    format_version: u32,
    dimension: usize,
    metric: DistanceMetric,
    rows: usize,
    vectors_file: String,
    vectors_digest: String,
    saved_at: DateTime<Utc>,
    chunks: Vec<ChunkRecord>,
}

/// Both artifacts of one save, encoded and ready to write.
#[derive(Debug)]
pub struct Encoded {
    vector_bytes: Vec<u8>,
    table_bytes: Vec<u8>,
    vectors_path: PathBuf,
    rows: usize,
    /// Timestamp recorded in the chunk table header
    pub saved_at: DateTime<Utc>,
}

/// Encode both artifacts of `index` without touching the filesystem.
pub fn encode(index: &FlatIndex, paths: &ArtifactPaths) -> Result<Encoded, StoreError> {
    let vector_bytes = bincode::serialize(&VectorFileRef {
        format_version: FORMAT_VERSION,
        dimension: index.dimension(),
        metric: index.metric(),
        rows: index.len(),
        data: index.vectors(),
    })
    .map_err(|e| StoreError::Encode(e.to_string()))?;

    let digest = blake3::hash(&vector_bytes).to_hex().to_string();
    let vectors_path = paths.vectors_for(&digest);
    let vectors_file = vectors_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| StoreError::Encode(format!("no file name in {}", vectors_path.display())))?;

    let saved_at = Utc::now();
    let table_bytes = serde_json::to_vec(&ChunkTableRef {
        format_version: FORMAT_VERSION,
        dimension: index.dimension(),
        metric: index.metric(),
        rows: index.len(),
        vectors_file: &vectors_file,
        vectors_digest: &digest,
        saved_at,
        chunks: index.records(),
    })
    .map_err(|e| StoreError::Encode(e.to_string()))?;

    Ok(Encoded {
        vector_bytes,
        table_bytes,
        vectors_path,
        rows: index.len(),
        saved_at,
    })
}

/// Write encoded artifacts, committing them by renaming the chunk table.
///
/// Each file is written to a temporary sibling and synced before it is
/// renamed. If anything fails before the chunk table rename, the previously
/// committed pair is untouched and the new vector file is removed.
pub fn write(encoded: &Encoded, paths: &ArtifactPaths) -> Result<(), StoreError> {
    if let Some(parent) = paths.chunks.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let vectors_existed = encoded.vectors_path.exists();
    let vectors_tmp = with_suffix(&encoded.vectors_path, ".tmp");
    let chunks_tmp = with_suffix(&paths.chunks, ".tmp");

    let committed = write_synced(&vectors_tmp, &encoded.vector_bytes)
        .and_then(|()| fs::rename(&vectors_tmp, &encoded.vectors_path).map_err(StoreError::from))
        .and_then(|()| write_synced(&chunks_tmp, &encoded.table_bytes))
        .and_then(|()| fs::rename(&chunks_tmp, &paths.chunks).map_err(StoreError::from));

    if let Err(e) = committed {
        for tmp in [&vectors_tmp, &chunks_tmp] {
            let _ = fs::remove_file(tmp);
        }
        if !vectors_existed {
            let _ = fs::remove_file(&encoded.vectors_path);
        }
        return Err(e);
    }

    for stale in paths.vector_files() {
        if stale != encoded.vectors_path
            && let Err(e) = fs::remove_file(&stale)
        {
            warn!("Failed to remove superseded vector file {:?}: {}", stale, e);
        }
    }

    debug!(
        "Wrote {} rows to {:?} and {:?}",
        encoded.rows, encoded.vectors_path, paths.chunks
    );
    Ok(())
}

/// Encode and write both artifacts for `index`.
pub fn save(index: &FlatIndex, paths: &ArtifactPaths) -> Result<DateTime<Utc>, StoreError> {
    let encoded = encode(index, paths)?;
    write(&encoded, paths)?;
    Ok(encoded.saved_at)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Read the committed chunk table, follow it to its vector file and rebuild
/// the index.
pub fn load(paths: &ArtifactPaths) -> Result<(FlatIndex, DateTime<Utc>), StoreError> {
    if !paths.chunks.exists() {
        return Err(StoreError::MissingArtifact(paths.chunks.clone()));
    }

    let table_bytes = fs::read(&paths.chunks)?;
    let table: ChunkTable =
        serde_json::from_slice(&table_bytes).map_err(|e| StoreError::Corrupt {
            path: paths.chunks.clone(),
            reason: e.to_string(),
        })?;
    check_version(&paths.chunks, table.format_version)?;
    if table.chunks.len() != table.rows {
        return Err(StoreError::Corrupt {
            path: paths.chunks.clone(),
            reason: format!(
                "header declares {} rows but table holds {}",
                table.rows,
                table.chunks.len()
            ),
        });
    }

    let vectors_path = resolve_vectors(paths, &table.vectors_file)?;
    if !vectors_path.exists() {
        return Err(StoreError::MissingArtifact(vectors_path));
    }
    let vector_bytes = fs::read(&vectors_path)?;
    if table.vectors_digest != blake3::hash(&vector_bytes).to_hex().as_str() {
        return Err(StoreError::Mismatch(
            "chunk table was not written with this vector file".to_string(),
        ));
    }

    let vectors: VectorFile =
        bincode::deserialize(&vector_bytes).map_err(|e| StoreError::Corrupt {
            path: vectors_path.clone(),
            reason: e.to_string(),
        })?;
    check_version(&vectors_path, vectors.format_version)?;
    if vectors.dimension == 0 {
        return Err(StoreError::Corrupt {
            path: vectors_path,
            reason: "dimension must be greater than zero".to_string(),
        });
    }
    if vectors.data.len() != vectors.rows * vectors.dimension {
        return Err(StoreError::Corrupt {
            path: vectors_path,
            reason: format!(
                "{} floats for {} rows of dimension {}",
                vectors.data.len(),
                vectors.rows,
                vectors.dimension
            ),
        });
    }

    if table.rows != vectors.rows {
        return Err(StoreError::Mismatch(format!(
            "{} vector rows but {} chunk rows",
            vectors.rows, table.rows
        )));
    }
    if table.dimension != vectors.dimension || table.metric != vectors.metric {
        return Err(StoreError::Mismatch(format!(
            "vector file is {} / {}, chunk table is {} / {}",
            vectors.dimension, vectors.metric, table.dimension, table.metric
        )));
    }

    let index = FlatIndex::from_parts(
        vectors.dimension,
        vectors.metric,
        vectors.data,
        table.chunks,
    )?;
    Ok((index, table.saved_at))
}

/// The vector file named by a chunk table, which must sit next to it.
fn resolve_vectors(paths: &ArtifactPaths, name: &str) -> Result<PathBuf, StoreError> {
    let plain = Path::new(name)
        .file_name()
        .is_some_and(|file_name| file_name == name);
    if !plain {
        return Err(StoreError::Corrupt {
            path: paths.chunks.clone(),
            reason: format!("vector file {name:?} is not a plain file name"),
        });
    }
    Ok(paths.dir().join(name))
}

fn check_version(path: &Path, version: u32) -> Result<(), StoreError> {
    if version == FORMAT_VERSION {
        return Ok(());
    }
    Err(StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("unsupported format version {version}"),
    })
}
