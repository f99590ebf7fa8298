//! Category filtering and reranking of retrieved candidates.

use std::sync::Arc;

use ragrec_core::{Candidate, ColumnMapping, RerankError, Reranker, Result, ValidationError};
use tracing::debug;

/// Filters candidates by category, scores them with the reranker and keeps
/// the best `rerank_top_k`.
pub struct RerankCoordinator {
    reranker: Arc<dyn Reranker>,
    rerank_top_k: usize,
    columns: ColumnMapping,
}

impl RerankCoordinator {
    pub fn new(reranker: Arc<dyn Reranker>, rerank_top_k: usize, columns: ColumnMapping) -> Self {
        Self {
            reranker,
            rerank_top_k,
            columns,
        }
    }

    /// Number of candidates kept after sorting.
    pub fn rerank_top_k(&self) -> usize {
        self.rerank_top_k
    }

    /// Rerank `candidates` against `query`.
    ///
    /// Returns `Ok(None)` when no candidate survives the category filter; the
    /// reranker is not called in that case. Otherwise the reranker is called
    /// once with the target text of every surviving candidate, candidates are
    /// sorted by descending rerank score (equal scores keep retrieval order)
    /// and the first `rerank_top_k` are returned.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        category: Option<&str>,
    ) -> Result<Option<Vec<Candidate>>> {
        let retrieved = candidates.len();
        let mut kept: Vec<Candidate> = match category {
            Some(wanted) => candidates
                .into_iter()
                .filter(|c| c.field(&self.columns.category_column) == Some(wanted))
                .collect(),
            None => candidates,
        };
        if kept.is_empty() {
            debug!("No candidates left after category filter ({retrieved} retrieved)");
            return Ok(None);
        }

        let documents = kept
            .iter()
            .map(|c| {
                c.field(&self.columns.target_column).ok_or_else(|| {
                    ValidationError::Invalid(format!(
                        "row {} has no column '{}'",
                        c.row, self.columns.target_column
                    ))
                })
            })
            .collect::<std::result::Result<Vec<&str>, _>>()?;

        let scores = self.reranker.score(query, &documents).await?;
        if scores.len() != kept.len() {
            return Err(RerankError::ScoreCount {
                expected: kept.len(),
                actual: scores.len(),
            }
            .into());
        }
        if let Some((i, bad)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(RerankError::InvalidResponse(format!(
                "non-finite score {bad} for candidate {i}"
            ))
            .into());
        }

        let scored = kept.len();
        for (candidate, score) in kept.iter_mut().zip(scores) {
            candidate.rerank_score = Some(score);
        }
        kept.sort_by(|a, b| {
            let a = a.rerank_score.unwrap_or(f32::NEG_INFINITY);
            let b = b.rerank_score.unwrap_or(f32::NEG_INFINITY);
            b.total_cmp(&a)
        });
        kept.truncate(self.rerank_top_k);

        debug!(
            "Reranked {} of {} candidates, kept {}",
            scored,
            retrieved,
            kept.len()
        );
        Ok(Some(kept))
    }
}
