//! Exact nearest-neighbor search over a flat vector arena.
//!
//! Vectors live in one contiguous `Vec<f32>` and chunk records in a parallel
//! `Vec<ChunkRecord>`. Row `i` of the arena is `vectors[i * D..(i + 1) * D]`
//! and always describes `records[i]`. Both arenas are append-only and only
//! grow together through [`FlatIndex::add`].

use ragrec_core::{Candidate, ChunkRecord, DistanceMetric, StoreError, ValidationError};
use tracing::debug;

/// Brute-force vector index with an aligned chunk table.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    vectors: Vec<f32>,
    records: Vec<ChunkRecord>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Result<Self, ValidationError> {
        if dimension == 0 {
            return Err(ValidationError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            metric,
            vectors: Vec::new(),
            records: Vec::new(),
        })
    }

    /// Rebuild an index from persisted arenas.
    pub fn from_parts(
        dimension: usize,
        metric: DistanceMetric,
        vectors: Vec<f32>,
        records: Vec<ChunkRecord>,
    ) -> Result<Self, StoreError> {
        if dimension == 0 {
            return Err(ValidationError::ZeroDimension.into());
        }
        if vectors.len() != records.len() * dimension {
            return Err(StoreError::Mismatch(format!(
                "{} floats cannot hold {} rows of dimension {}",
                vectors.len(),
                records.len(),
                dimension
            )));
        }
        Ok(Self {
            dimension,
            metric,
            vectors,
            records,
        })
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The raw vector arena, row-major.
    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// The chunk table.
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Vector at `row`.
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.dimension;
        Some(&self.vectors[start..start + self.dimension])
    }

    /// Chunk record at `row`.
    pub fn record(&self, row: usize) -> Option<&ChunkRecord> {
        self.records.get(row)
    }

    /// Append rows, returning the row index of the first appended row.
    ///
    /// Every vector is checked before anything is appended, so a rejected
    /// batch leaves the index unchanged.
    pub fn add(
        &mut self,
        records: Vec<ChunkRecord>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, ValidationError> {
        if records.len() != vectors.len() {
            return Err(ValidationError::RowCountMismatch {
                vectors: vectors.len(),
                records: records.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(ValidationError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        let first_row = self.len();
        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in &vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.records.extend(records);

        debug!("Appended {} rows at row {}", vectors.len(), first_row);
        Ok(first_row)
    }

    /// Return up to `k` nearest rows to `query`, closest first.
    ///
    /// Equal scores are ordered by ascending row. An empty index yields an
    /// empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>, ValidationError> {
        if query.len() != self.dimension {
            return Err(ValidationError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| (row, self.metric.score(query, vector)))
            .collect();

        let metric = self.metric;
        let order = |a: &(usize, f32), b: &(usize, f32)| {
            metric.compare(a.1, b.1).then_with(|| a.0.cmp(&b.0))
        };

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, order);
            scored.truncate(k);
        }
        scored.sort_unstable_by(order);

        Ok(scored
            .into_iter()
            .map(|(row, score)| Candidate {
                row,
                record: self.records[row].clone(),
                score,
                rerank_score: None,
            })
            .collect())
    }

    /// First row whose `column` equals `value`.
    pub fn find_first(&self, column: &str, value: &str) -> Option<(usize, &ChunkRecord)> {
        self.records
            .iter()
            .enumerate()
            .find(|(_, record)| record.field(column) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ChunkRecord {
        ChunkRecord::new("domain", name, format!("https://example.com/{name}"), name)
    }

    fn index_with(vectors: &[[f32; 2]], metric: DistanceMetric) -> FlatIndex {
        let mut index = FlatIndex::new(2, metric).unwrap();
        let records = (0..vectors.len()).map(|i| record(&format!("r{i}"))).collect();
        index
            .add(records, vectors.iter().map(|v| v.to_vec()).collect())
            .unwrap();
        index
    }

    #[test]
    fn test_new_index_is_empty() {
        let index = FlatIndex::new(4, DistanceMetric::InnerProduct).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.dimension(), 4);
    }

    #[test]
    fn test_add_keeps_rows_aligned() {
        let mut index = FlatIndex::new(2, DistanceMetric::InnerProduct).unwrap();
        let first = index
            .add(
                vec![record("a"), record("b")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .unwrap();
        assert_eq!(first, 0);

        let second = index.add(vec![record("c")], vec![vec![0.5, 0.5]]).unwrap();
        assert_eq!(second, 2);

        assert_eq!(index.len(), 3);
        assert_eq!(index.record(1).unwrap().file_name, "b");
        assert_eq!(index.vector(1).unwrap(), &[0.0, 1.0]);
        assert_eq!(index.record(2).unwrap().file_name, "c");
        assert_eq!(index.vector(2).unwrap(), &[0.5, 0.5]);
        assert!(index.vector(3).is_none());
    }

    #[test]
    fn test_add_rejects_dimension_mismatch_atomically() {
        let mut index = FlatIndex::new(2, DistanceMetric::InnerProduct).unwrap();
        let err = index
            .add(
                vec![record("a"), record("b")],
                vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
            )
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert!(index.is_empty());
        assert!(index.vectors().is_empty());
    }

    #[test]
    fn test_add_rejects_row_count_mismatch() {
        let mut index = FlatIndex::new(2, DistanceMetric::InnerProduct).unwrap();
        let err = index
            .add(vec![record("a")], vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap_err();
        assert!(matches!(err, ValidationError::RowCountMismatch { .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_empty_index_returns_empty() {
        let index = FlatIndex::new(2, DistanceMetric::InnerProduct).unwrap();
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_query_dimension_mismatch() {
        let index = index_with(&[[1.0, 0.0]], DistanceMetric::InnerProduct);
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_search_inner_product_orders_highest_first() {
        let index = index_with(
            &[[0.1, 0.0], [0.9, 0.0], [0.5, 0.0]],
            DistanceMetric::InnerProduct,
        );
        let rows: Vec<usize> = index
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|c| c.row)
            .collect();
        assert_eq!(rows, vec![1, 2, 0]);
    }

    #[test]
    fn test_search_l2_orders_lowest_first() {
        let index = index_with(&[[3.0, 0.0], [1.0, 0.0], [2.0, 0.0]], DistanceMetric::L2);
        let results = index.search(&[0.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = results.iter().map(|c| c.row).collect();
        assert_eq!(rows, vec![1, 2, 0]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_ties_break_by_ascending_row() {
        let index = index_with(
            &[[0.5, 0.0], [0.9, 0.0], [0.5, 0.0], [0.5, 0.0]],
            DistanceMetric::InnerProduct,
        );
        let rows: Vec<usize> = index
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|c| c.row)
            .collect();
        assert_eq!(rows, vec![1, 0, 2]);
    }

    #[test]
    fn test_search_top_k_bound() {
        let index = index_with(
            &[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.5, 0.2]],
            DistanceMetric::Cosine,
        );
        for k in 0..8 {
            let results = index.search(&[1.0, 0.5], k).unwrap();
            assert_eq!(results.len(), k.min(index.len()), "k = {k}");
        }
    }

    #[test]
    fn test_search_is_deterministic() {
        let vectors: Vec<[f32; 2]> = (0..50)
            .map(|i| [(i % 7) as f32, (i % 3) as f32])
            .collect();
        let index = index_with(&vectors, DistanceMetric::InnerProduct);

        let first = index.search(&[0.3, 0.7], 10).unwrap();
        for _ in 0..5 {
            assert_eq!(index.search(&[0.3, 0.7], 10).unwrap(), first);
        }
    }

    #[test]
    fn test_search_partial_selection_matches_full_sort() {
        let vectors: Vec<[f32; 2]> = (0..40)
            .map(|i| [((i * 13) % 11) as f32, ((i * 7) % 5) as f32])
            .collect();
        let index = index_with(&vectors, DistanceMetric::L2);

        let all = index.search(&[4.0, 2.0], 40).unwrap();
        let top = index.search(&[4.0, 2.0], 6).unwrap();
        assert_eq!(top, all[..6].to_vec());
    }

    #[test]
    fn test_candidates_carry_their_record() {
        let index = index_with(&[[1.0, 0.0], [0.0, 1.0]], DistanceMetric::InnerProduct);
        let results = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(results[0].row, 1);
        assert_eq!(results[0].record.file_name, "r1");
        assert!(results[0].rerank_score.is_none());
    }

    #[test]
    fn test_find_first_returns_lowest_row() {
        let mut index = FlatIndex::new(1, DistanceMetric::InnerProduct).unwrap();
        index
            .add(
                vec![
                    ChunkRecord::new("a", "one", "u", "first"),
                    ChunkRecord::new("b", "two", "u", "second"),
                    ChunkRecord::new("c", "two", "u", "third"),
                ],
                vec![vec![1.0], vec![1.0], vec![1.0]],
            )
            .unwrap();

        let (row, found) = index.find_first("file_name", "two").unwrap();
        assert_eq!(row, 1);
        assert_eq!(found.text, "second");
        assert!(index.find_first("file_name", "three").is_none());
        assert!(index.find_first("no_such_column", "two").is_none());
    }

    #[test]
    fn test_from_parts_rejects_misaligned_arenas() {
        let err = FlatIndex::from_parts(
            2,
            DistanceMetric::InnerProduct,
            vec![1.0, 0.0, 0.0],
            vec![record("a")],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Mismatch(_)));
    }

    #[test]
    fn test_new_rejects_zero_dimension() {
        let err = FlatIndex::new(0, DistanceMetric::InnerProduct).unwrap_err();
        assert_eq!(err, ValidationError::ZeroDimension);
    }

    #[test]
    fn test_from_parts_rejects_zero_dimension() {
        let err = FlatIndex::from_parts(
            0,
            DistanceMetric::InnerProduct,
            Vec::new(),
            vec![record("a")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ZeroDimension)
        ));
    }
}
