//! Cross-encoder rerank client (`/rerank`, as served by vLLM and Cohere-style APIs).

use async_trait::async_trait;
use ragrec_core::{Error, RerankError, Reranker};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{EndpointSettings, build_client, post_json};

/// Reranker backed by `POST {base}/rerank`.
pub struct HttpReranker {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpReranker {
    /// Create a client for the rerank endpoint.
    pub fn new(settings: &EndpointSettings) -> Result<Self, Error> {
        Ok(Self {
            client: build_client(settings)?,
            endpoint: settings.url("rerank"),
            model: settings.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Place each result's score at its document index.
fn scores_in_document_order(
    response: RerankResponse,
    documents: usize,
) -> Result<Vec<f32>, RerankError> {
    if response.results.len() != documents {
        return Err(RerankError::ScoreCount {
            expected: documents,
            actual: response.results.len(),
        });
    }

    let mut scores = vec![None; documents];
    for result in response.results {
        let slot = scores.get_mut(result.index).ok_or_else(|| {
            RerankError::InvalidResponse(format!(
                "result index {} out of range for {documents} documents",
                result.index
            ))
        })?;
        if slot.replace(result.relevance_score).is_some() {
            return Err(RerankError::InvalidResponse(format!(
                "duplicate result index {}",
                result.index
            )));
        }
    }

    scores
        .into_iter()
        .map(|score| {
            score.ok_or_else(|| RerankError::InvalidResponse("missing result index".to_string()))
        })
        .collect()
}

#[async_trait]
impl Reranker for HttpReranker {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, RerankError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: documents.len(),
        };
        let response: RerankResponse = post_json(&self.client, &self.endpoint, &request).await?;
        scores_in_document_order(response, documents.len())
    }
}
