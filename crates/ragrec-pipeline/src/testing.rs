//! Test collaborators for the pipeline tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ragrec_core::{
    ChunkRecord, ColumnMapping, DistanceMetric, EmbedError, Embedder, EmbeddingConfig,
    EmbeddingOutput, GenerateError, Generator, RerankError, Reranker,
};
use ragrec_embed::HashingEmbedder;
use ragrec_query::{RecommendationService, RerankCoordinator, Retriever};
use ragrec_store::VectorIndex;
use tempfile::TempDir;

const DIM: usize = 256;

pub struct FailingEmbedder {
    pub dimension: usize,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &'static str {
        "failing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(
        &self,
        _texts: &[&str],
        _config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Err(EmbedError::Request("embedding service down".to_string()))
    }
}

/// Scores a document by the number of lowercase words it shares with the query.
pub struct OverlapReranker;

fn words(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

#[async_trait]
impl Reranker for OverlapReranker {
    fn model_name(&self) -> &'static str {
        "overlap"
    }

    #[allow(clippy::cast_precision_loss)]
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, RerankError> {
        let query = words(query);
        Ok(documents
            .iter()
            .map(|d| words(d).intersection(&query).count() as f32)
            .collect())
    }
}

#[derive(Default)]
pub struct EchoGenerator {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &'static str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("answer to: {prompt}"))
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &'static str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        Err(GenerateError::Request("generator down".to_string()))
    }
}

fn service(index: Arc<VectorIndex>, rerank_top_k: usize) -> RecommendationService {
    RecommendationService::new(
        Retriever::new(index, Arc::new(HashingEmbedder::new(DIM)), 3),
        RerankCoordinator::new(
            Arc::new(OverlapReranker),
            rerank_top_k,
            ColumnMapping::default(),
        ),
        ColumnMapping::default(),
    )
}

/// A service over three lab descriptions.
pub async fn recommender() -> (TempDir, RecommendationService) {
    recommender_keeping(2).await
}

/// A service over three lab descriptions keeping `rerank_top_k` candidates.
pub async fn recommender_keeping(rerank_top_k: usize) -> (TempDir, RecommendationService) {
    let dir = tempfile::tempdir().unwrap();
    let index =
        VectorIndex::new(dir.path().join("index"), DIM, DistanceMetric::InnerProduct).unwrap();
    let records = vec![
        ChunkRecord::new("blood", "ferritin", "u", "Ferritin reflects iron stores"),
        ChunkRecord::new("blood", "glucose", "u", "Fasting glucose measures blood sugar"),
        ChunkRecord::new("hormone", "tsh", "u", "TSH screens thyroid function"),
    ];
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    let vectors = HashingEmbedder::new(DIM)
        .embed_text(&texts, &EmbeddingConfig::default())
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.embedding)
        .collect();
    index.add(records, vectors).await.unwrap();
    (dir, service(Arc::new(index), rerank_top_k))
}

/// A service over an index with no rows.
pub async fn empty_recommender() -> (TempDir, RecommendationService) {
    let dir = tempfile::tempdir().unwrap();
    let index =
        VectorIndex::new(dir.path().join("index"), DIM, DistanceMetric::InnerProduct).unwrap();
    (dir, service(Arc::new(index), 2))
}
