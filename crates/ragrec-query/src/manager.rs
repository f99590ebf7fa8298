//! Capability dispatch between recommendation and report generation.
//!
//! A deployment runs exactly one [`Manager`], chosen once at startup from a
//! [`ManagerKind`]. Asking a manager for a capability it does not have is a
//! validation error rather than a runtime attribute lookup.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ragrec_core::{Generator, InputType, RankedResult, Result, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::service::RecommendationService;

/// Which manager a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    Recommendation,
    Report,
}

impl ManagerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recommendation => "recommendation",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagerKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recommendation" | "recommend" => Ok(Self::Recommendation),
            "report" => Ok(Self::Report),
            other => Err(ValidationError::Invalid(format!(
                "unknown manager '{other}'; use recommendation or report"
            ))),
        }
    }
}

/// Forwards prompts to the generator collaborator.
pub struct ReportService {
    generator: Arc<dyn Generator>,
}

impl ReportService {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Generate a report from a prompt, passed to the generator unchanged.
    pub async fn report(&self, prompt: &str) -> Result<String> {
        debug!(
            "Generating report with {} ({} chars)",
            self.generator.model_name(),
            prompt.len()
        );
        Ok(self.generator.generate(prompt).await?)
    }
}

/// The service a deployment exposes.
pub enum Manager {
    Recommendation(RecommendationService),
    Report(ReportService),
}

impl Manager {
    pub fn kind(&self) -> ManagerKind {
        match self {
            Self::Recommendation(_) => ManagerKind::Recommendation,
            Self::Report(_) => ManagerKind::Report,
        }
    }

    fn recommender(&self, capability: &'static str) -> Result<&RecommendationService> {
        match self {
            Self::Recommendation(service) => Ok(service),
            Self::Report(_) => Err(unsupported(ManagerKind::Report, capability)),
        }
    }

    pub async fn answer_candidates(
        &self,
        value: &str,
        input_type: InputType,
        category: Option<&str>,
    ) -> Result<Option<RankedResult>> {
        self.recommender("answer_candidates")?
            .answer_candidates(value, input_type, category)
            .await
    }

    pub async fn answer_with_code(
        &self,
        value: &str,
        input_type: i64,
        category: Option<&str>,
    ) -> Result<Option<RankedResult>> {
        self.recommender("answer_candidates")?
            .answer_with_code(value, input_type, category)
            .await
    }

    pub async fn recommend(&self, text: &str) -> Result<Option<RankedResult>> {
        self.recommender("recommend")?.recommend(text).await
    }

    pub async fn report(&self, prompt: &str) -> Result<String> {
        match self {
            Self::Report(service) => service.report(prompt).await,
            Self::Recommendation(_) => Err(unsupported(ManagerKind::Recommendation, "report")),
        }
    }
}

fn unsupported(kind: ManagerKind, capability: &'static str) -> ragrec_core::Error {
    ValidationError::UnsupportedCapability {
        manager: kind.as_str(),
        capability,
    }
    .into()
}
