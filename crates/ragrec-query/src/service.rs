//! Retrieve-and-rerank recommendation flow.

use std::sync::Arc;

use ragrec_core::{
    ColumnMapping, InputMode, InputType, RankedResult, Result, ValidationError,
};
use ragrec_store::VectorIndex;
use tracing::{debug, info};

use crate::rerank::RerankCoordinator;
use crate::retriever::Retriever;

/// Resolves the query text, retrieves candidates and reranks them.
///
/// Immutable after construction; share it behind an `Arc` across requests.
pub struct RecommendationService {
    index: Arc<VectorIndex>,
    retriever: Retriever,
    coordinator: RerankCoordinator,
    columns: ColumnMapping,
    input_mode: InputMode,
}

impl RecommendationService {
    pub fn new(retriever: Retriever, coordinator: RerankCoordinator, columns: ColumnMapping) -> Self {
        Self {
            index: Arc::clone(retriever.index()),
            retriever,
            coordinator,
            columns,
            input_mode: InputMode::default(),
        }
    }

    /// Accept these numeric input type codes in [`answer_with_code`](Self::answer_with_code).
    #[must_use]
    pub fn with_input_mode(mut self, input_mode: InputMode) -> Self {
        self.input_mode = input_mode;
        self
    }

    /// The numeric input type codes.
    pub fn input_mode(&self) -> &InputMode {
        &self.input_mode
    }

    /// The column mapping.
    pub fn columns(&self) -> &ColumnMapping {
        &self.columns
    }

    /// The index this service reads.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Query text for an input value.
    ///
    /// Identifiers resolve to the target column of the first row whose id
    /// column matches; `Ok(None)` if no row matches.
    pub async fn resolve_query(&self, value: &str, input_type: InputType) -> Result<Option<String>> {
        match input_type {
            InputType::Text => Ok(Some(value.to_string())),
            InputType::Identifier => {
                let Some(record) = self.index.find_first(&self.columns.id_column, value).await
                else {
                    debug!("No row with {} = {:?}", self.columns.id_column, value);
                    return Ok(None);
                };
                let text = record.field(&self.columns.target_column).ok_or_else(|| {
                    ValidationError::Invalid(format!(
                        "row for {value:?} has no column '{}'",
                        self.columns.target_column
                    ))
                })?;
                Ok(Some(text.to_string()))
            }
        }
    }

    /// Ranked candidates for an input value, optionally restricted to one
    /// category.
    ///
    /// `Ok(None)` means no match: the identifier is unknown or no candidate
    /// belongs to the category.
    pub async fn answer_candidates(
        &self,
        value: &str,
        input_type: InputType,
        category: Option<&str>,
    ) -> Result<Option<RankedResult>> {
        let Some(query) = self.resolve_query(value, input_type).await? else {
            return Ok(None);
        };

        let candidates = self.retriever.retrieve(&query).await?;
        let Some(ranked) = self.coordinator.rerank(&query, candidates, category).await? else {
            return Ok(None);
        };

        info!(
            "Recommended {} candidates for {:?} input",
            ranked.len(),
            input_type
        );
        Ok(Some(RankedResult {
            query,
            candidates: ranked,
        }))
    }

    /// [`answer_candidates`](Self::answer_candidates) with the input type
    /// given as a numeric code.
    pub async fn answer_with_code(
        &self,
        value: &str,
        input_type: i64,
        category: Option<&str>,
    ) -> Result<Option<RankedResult>> {
        let input_type = self.input_mode.resolve(input_type)?;
        self.answer_candidates(value, input_type, category).await
    }

    /// Ranked candidates for free text, without a category filter.
    pub async fn recommend(&self, text: &str) -> Result<Option<RankedResult>> {
        self.answer_candidates(text, InputType::Text, None).await
    }
}
