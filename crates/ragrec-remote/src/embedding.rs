//! OpenAI-compatible embeddings client.

use async_trait::async_trait;
use ragrec_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput, Error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{EndpointSettings, build_client, post_json};

/// Embedder backed by `POST {base}/embeddings`.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Create a client for an endpoint serving vectors of `dimension` floats.
    pub fn new(settings: &EndpointSettings, dimension: usize) -> Result<Self, Error> {
        Ok(Self {
            client: build_client(settings)?,
            endpoint: settings.url("embeddings"),
            model: settings.model.clone(),
            dimension,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
}

/// Turn a response into one output per input, in input order.
fn into_outputs(
    mut response: EmbeddingResponse,
    inputs: usize,
    dimension: usize,
    normalize: bool,
) -> Result<Vec<EmbeddingOutput>, EmbedError> {
    if response.data.len() != inputs {
        return Err(EmbedError::InvalidResponse(format!(
            "endpoint returned {} embeddings for {} inputs",
            response.data.len(),
            inputs
        )));
    }
    response.data.sort_by_key(|entry| entry.index);
    if response
        .data
        .iter()
        .enumerate()
        .any(|(i, entry)| entry.index != i)
    {
        return Err(EmbedError::InvalidResponse(
            "embedding indices are not a permutation of the inputs".to_string(),
        ));
    }

    let tokens_each = response
        .usage
        .map_or(0, |usage| usage.prompt_tokens / inputs.max(1));

    response
        .data
        .into_iter()
        .map(|entry| {
            let mut embedding = entry.embedding;
            if embedding.len() != dimension {
                return Err(EmbedError::InvalidResponse(format!(
                    "expected dimension {dimension}, got {}",
                    embedding.len()
                )));
            }
            if normalize {
                let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut embedding {
                        *v /= norm;
                    }
                }
            }
            Ok(EmbeddingOutput {
                embedding,
                token_count: tokens_each,
            })
        })
        .collect()
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbeddingResponse = post_json(&self.client, &self.endpoint, &request).await?;
        into_outputs(response, texts.len(), self.dimension, config.normalize)
    }
}
