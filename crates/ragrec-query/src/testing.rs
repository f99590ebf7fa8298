//! Test collaborators shared by the module tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ragrec_core::{
    ChunkRecord, DistanceMetric, EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput,
    GenerateError, Generator, RerankError, Reranker,
};
use ragrec_store::VectorIndex;
use tempfile::TempDir;

const KEYWORDS: [&str; 4] = ["iron", "sugar", "thyroid", "vitamin"];

#[allow(clippy::cast_precision_loss)]
fn keyword_counts(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .map(|k| lower.matches(k).count() as f32)
        .collect()
}

/// One dimension per keyword, holding its occurrence count.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &'static str {
        "keyword"
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        _config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts
            .iter()
            .map(|t| EmbeddingOutput {
                embedding: keyword_counts(t),
                token_count: t.split_whitespace().count(),
            })
            .collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &'static str {
        "failing"
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    async fn embed_text(
        &self,
        _texts: &[&str],
        _config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Err(EmbedError::Request("embedding service down".to_string()))
    }
}

/// Reranker returning fixed scores, or keyword overlap when none are set.
/// Records every call.
#[derive(Default)]
pub struct ScriptedReranker {
    scores: Option<Vec<f32>>,
    fail: bool,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedReranker {
    pub fn with_scores(scores: Vec<f32>) -> Self {
        Self {
            scores: Some(scores),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_documents(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, docs)| docs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Reranker for ScriptedReranker {
    fn model_name(&self) -> &'static str {
        "scripted"
    }

    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, RerankError> {
        self.calls.lock().unwrap().push((
            query.to_string(),
            documents.iter().map(ToString::to_string).collect(),
        ));
        if self.fail {
            return Err(RerankError::Request("reranker down".to_string()));
        }
        if let Some(scores) = &self.scores {
            return Ok(scores.clone());
        }
        let query = keyword_counts(query);
        Ok(documents
            .iter()
            .map(|d| {
                keyword_counts(d)
                    .iter()
                    .zip(&query)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect())
    }
}

/// Generator echoing a prefix of its prompt, recording every prompt.
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

pub fn sample_records() -> Vec<ChunkRecord> {
    [
        ("blood", "ferritin", "Ferritin reflects iron stores; low iron means low ferritin"),
        ("blood", "glucose", "Fasting glucose measures blood sugar"),
        ("hormone", "tsh", "TSH screens thyroid function; thyroid disease"),
        ("blood", "iron_panel", "Serum iron and binding capacity"),
        ("vitamin", "vitamin_d", "Vitamin D level"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (domain, name, text))| {
        ChunkRecord::new(*domain, *name, format!("https://labs.example/{name}"), *text)
            .with_extra("lab_id", format!("LAB-{}", i + 1))
    })
    .collect()
}

/// An unsaved index over [`sample_records`], embedded with [`KeywordEmbedder`].
pub async fn sample_index() -> (TempDir, Arc<VectorIndex>) {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new(
        dir.path().join("index"),
        KEYWORDS.len(),
        DistanceMetric::InnerProduct,
    )
    .unwrap();
    let records = sample_records();
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    let vectors = KeywordEmbedder
        .embed_text(&texts, &EmbeddingConfig::default())
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.embedding)
        .collect();
    index.add(records, vectors).await.unwrap();
    (dir, Arc::new(index))
}
