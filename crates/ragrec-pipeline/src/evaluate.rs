//! Batch evaluation: recommend, build context, generate an answer.

use std::path::Path;
use std::sync::Arc;

use ragrec_core::{RankedResult, Result};
use ragrec_query::{RecommendationService, ReportService};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::table::{EvalRow, read_questions, write_eval_rows};

/// Context written when a question has no ranked result.
pub const NO_CONTEXT: &str = "No relevant context found.";

/// Answer written when a question has no ranked result.
pub const NO_ANSWER: &str = "I could not find relevant information to answer the question.";

/// Column read from the question table.
pub const QUESTION_COLUMN: &str = "question";

const DEFAULT_TEMPLATE: &str = "Use the following context to answer the question. \
If the context does not contain the answer, say so.\n\n\
Context:\n{context}\n\n\
Question: {question}\n\n\
Answer:";

/// Prompt with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl Default for PromptTemplate {
    fn default() -> Self {
        Self(DEFAULT_TEMPLATE.to_string())
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute both placeholders.
    ///
    /// Placeholders inside the substituted context are left alone.
    pub fn render(&self, context: &str, question: &str) -> String {
        self.0
            .split("{context}")
            .map(|piece| piece.replace("{question}", question))
            .collect::<Vec<_>>()
            .join(context)
    }
}

/// Target-column texts of the ranked candidates, one per line.
pub fn build_context(result: &RankedResult, target_column: &str) -> String {
    result
        .candidates
        .iter()
        .filter_map(|c| c.field(target_column))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs every question through the recommendation flow and the generator.
pub struct Evaluator {
    recommender: Arc<RecommendationService>,
    reporter: Arc<ReportService>,
    template: PromptTemplate,
}

impl Evaluator {
    pub fn new(recommender: Arc<RecommendationService>, reporter: Arc<ReportService>) -> Self {
        Self {
            recommender,
            reporter,
            template: PromptTemplate::default(),
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Answer one question.
    ///
    /// Without a ranked result, or with one holding no candidates, the
    /// placeholders are used and the generator is not called.
    pub async fn evaluate_one(&self, question: &str) -> Result<EvalRow> {
        let ranked = self
            .recommender
            .recommend(question)
            .await?
            .filter(|result| !result.candidates.is_empty());
        let Some(result) = ranked else {
            debug!("No context for {:?}", question);
            return Ok(EvalRow {
                question: question.to_string(),
                retrieved_context: NO_CONTEXT.to_string(),
                answer: NO_ANSWER.to_string(),
            });
        };

        let context = build_context(&result, &self.recommender.columns().target_column);
        let prompt = self.template.render(&context, question);
        let answer = self.reporter.report(&prompt).await?;
        Ok(EvalRow {
            question: question.to_string(),
            retrieved_context: context,
            answer,
        })
    }

    /// Answer every question, in order. The first failure aborts the run.
    pub async fn evaluate(&self, questions: &[String]) -> Result<Vec<EvalRow>> {
        let mut rows = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            debug!("Evaluating question {}/{}", i + 1, questions.len());
            rows.push(self.evaluate_one(question).await?);
        }
        let unanswered = rows.iter().filter(|r| r.answer == NO_ANSWER).count();
        info!(
            "Evaluated {} questions ({} without context)",
            rows.len(),
            unanswered
        );
        Ok(rows)
    }

    /// Read questions from `input`, evaluate them and write the rows to
    /// `output`.
    pub async fn evaluate_csv(&self, input: &Path, output: &Path) -> Result<Vec<EvalRow>> {
        let questions = read_questions(input, QUESTION_COLUMN)?;
        let rows = self.evaluate(&questions).await?;
        write_eval_rows(output, &rows)?;
        info!("Wrote {} rows to {:?}", rows.len(), output);
        Ok(rows)
    }
}
