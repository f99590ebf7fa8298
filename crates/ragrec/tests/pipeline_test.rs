//! Integration tests for the full ragrec pipeline.
//!
//! Tests the complete flow: ingest → save → load → recommend → evaluate.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ragrec_chunker::FixedSizeChunker;
use ragrec_core::{
    ChunkConfig, ColumnMapping, DistanceMetric, EmbeddingConfig, Embedder, GenerateError,
    Generator, InputType, RerankError, Reranker,
};
use ragrec_embed::{EmbedderPool, HashingEmbedder};
use ragrec_pipeline::{
    EvalRow, Evaluator, IngestConfig, Ingestor, NO_ANSWER, NO_CONTEXT, PromptTemplate,
};
use ragrec_query::{Manager, RecommendationService, ReportService, RerankCoordinator, Retriever};
use ragrec_store::VectorIndex;
use tempfile::tempdir;

const TEST_DIM: usize = 256;

const SOURCES: &str = "domain,file_name,url,text,lab_id
blood,ferritin.pdf,https://labs.example/ferritin,\"Ferritin reflects iron stores. Low ferritin means depleted iron.\",LAB-1
blood,glucose.pdf,https://labs.example/glucose,Fasting glucose measures blood sugar after an overnight fast.,LAB-2
hormone,tsh.pdf,https://labs.example/tsh,TSH screens thyroid function and thyroid disease.,LAB-3
vitamin,vitamin_d.pdf,https://labs.example/vitd,Vitamin D level reflects sun exposure and diet.,LAB-4
blood,empty.pdf,https://labs.example/empty,,LAB-5
";

/// Scores a document by the number of lowercase words it shares with the query.
#[derive(Default)]
struct OverlapReranker {
    calls: Mutex<usize>,
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Reranker for OverlapReranker {
    fn model_name(&self) -> &'static str {
        "overlap"
    }

    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, RerankError> {
        *self.calls.lock().unwrap() += 1;
        let query = words(query);
        Ok(documents
            .iter()
            .map(|d| words(d).intersection(&query).count() as f32)
            .collect())
    }
}

/// Mock generator recording every prompt.
#[derive(Default)]
struct MockGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for MockGenerator {
    fn model_name(&self) -> &'static str {
        "mock-generator"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("answer #{}", prompts.len()))
    }
}

async fn ingest_sources(dir: &Path) -> std::path::PathBuf {
    let csv_path = dir.join("sources.csv");
    std::fs::write(&csv_path, SOURCES).unwrap();
    let base = dir.join("index");

    let index = Arc::new(
        VectorIndex::open_or_create(&base, TEST_DIM, DistanceMetric::InnerProduct)
            .await
            .unwrap(),
    );
    let pool = Arc::new(EmbedderPool::new(
        Arc::new(HashingEmbedder::new(TEST_DIM)),
        2,
    ));
    let ingestor = Ingestor::new(
        index,
        pool,
        IngestConfig {
            chunk_config: ChunkConfig {
                chunk_size: 40,
                overlap: 10,
            },
            embed_config: EmbeddingConfig {
                batch_size: 3,
                ..Default::default()
            },
        },
    )
    .unwrap();

    let report = ingestor.ingest_csv(&csv_path).await.unwrap();
    assert_eq!(report.rows_read, 5);
    assert_eq!(report.rows_skipped, 1);
    assert!(report.chunks_added > 4);
    base
}

fn service(index: Arc<VectorIndex>, reranker: Arc<OverlapReranker>) -> RecommendationService {
    let columns = ColumnMapping::default();
    RecommendationService::new(
        Retriever::new(index, Arc::new(HashingEmbedder::new(TEST_DIM)), 50),
        RerankCoordinator::new(reranker, 3, columns.clone()),
        columns,
    )
}

#[tokio::test]
async fn test_ingest_then_recommend_from_reloaded_index() {
    let dir = tempdir().unwrap();
    let base = ingest_sources(dir.path()).await;

    let index = Arc::new(VectorIndex::open(&base).await.unwrap());
    let reranker = Arc::new(OverlapReranker::default());
    let manager = Manager::Recommendation(service(Arc::clone(&index), Arc::clone(&reranker)));

    let result = manager.recommend("low iron ferritin").await.unwrap().unwrap();

    assert_eq!(result.query, "low iron ferritin");
    assert!(result.candidates.len() <= 3);
    assert_eq!(result.candidates[0].record.file_name, "ferritin.pdf");
    assert_eq!(result.candidates[0].field("lab_id"), Some("LAB-1"));
    let scores: Vec<f32> = result
        .candidates
        .iter()
        .map(|c| c.rerank_score.unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(*reranker.calls.lock().unwrap(), 1);
    assert!(index.find_first("file_name", "empty.pdf").await.is_none());
}

#[tokio::test]
async fn test_identifier_and_category_paths() {
    let dir = tempdir().unwrap();
    let base = ingest_sources(dir.path()).await;
    let index = Arc::new(VectorIndex::open(&base).await.unwrap());
    let reranker = Arc::new(OverlapReranker::default());
    let service = service(index, Arc::clone(&reranker));

    let by_id = service
        .answer_candidates("tsh.pdf", InputType::Identifier, Some("hormone"))
        .await
        .unwrap()
        .unwrap();
    assert!(by_id.query.starts_with("TSH screens"));
    assert!(
        by_id
            .candidates
            .iter()
            .all(|c| c.record.domain == "hormone")
    );

    let unknown = service
        .answer_candidates("missing.pdf", InputType::Identifier, None)
        .await
        .unwrap();
    assert!(unknown.is_none());

    let no_category = service
        .answer_candidates("iron", InputType::Text, Some("imaging"))
        .await
        .unwrap();
    assert!(no_category.is_none());

    let by_code = service.answer_with_code("vitamin", 1, Some("vitamin")).await.unwrap();
    assert_eq!(by_code.unwrap().candidates[0].record.file_name, "vitamin_d.pdf");
    assert!(service.answer_with_code("vitamin", 5, None).await.is_err());
}

#[tokio::test]
async fn test_save_load_preserves_search_results() {
    let dir = tempdir().unwrap();
    let base = ingest_sources(dir.path()).await;

    let first = VectorIndex::open(&base).await.unwrap();
    let probe = HashingEmbedder::new(TEST_DIM)
        .embed_query("thyroid function", &EmbeddingConfig::default())
        .await
        .unwrap()
        .embedding;
    let before = first.search(&probe, 5).await.unwrap();

    first.save().await.unwrap();
    let second = VectorIndex::open(&base).await.unwrap();
    let after = second.search(&probe, 5).await.unwrap();

    assert_eq!(before, after);
    assert_eq!(first.len().await, second.len().await);
}

#[tokio::test]
async fn test_ingest_appends_to_existing_index() {
    let dir = tempdir().unwrap();
    let base = ingest_sources(dir.path()).await;
    let rows_before = VectorIndex::open(&base).await.unwrap().len().await;

    ingest_sources(dir.path()).await;

    let rows_after = VectorIndex::open(&base).await.unwrap().len().await;
    assert_eq!(rows_after, rows_before * 2);
}

#[tokio::test]
async fn test_reopen_with_other_dimension_fails() {
    let dir = tempdir().unwrap();
    let base = ingest_sources(dir.path()).await;

    let result =
        VectorIndex::open_or_create(&base, TEST_DIM / 2, DistanceMetric::InnerProduct).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_evaluate_end_to_end() {
    let dir = tempdir().unwrap();
    let base = ingest_sources(dir.path()).await;
    let index = Arc::new(VectorIndex::open(&base).await.unwrap());

    let questions = dir.path().join("questions.csv");
    let output = dir.path().join("out/results.csv");
    std::fs::write(
        &questions,
        "question\nWhat do low ferritin levels mean?\nHow is thyroid function screened?\n",
    )
    .unwrap();

    let generator = Arc::new(MockGenerator::default());
    let evaluator = Evaluator::new(
        Arc::new(service(index, Arc::new(OverlapReranker::default()))),
        Arc::new(ReportService::new(
            Arc::clone(&generator) as Arc<dyn Generator>
        )),
    )
    .with_template(PromptTemplate::new("CONTEXT:\n{context}\nQ: {question}"));

    let rows = evaluator.evaluate_csv(&questions, &output).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].answer, "answer #1");
    assert_eq!(rows[1].answer, "answer #2");
    assert_ne!(rows[0].retrieved_context, NO_CONTEXT);
    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[1].ends_with("Q: How is thyroid function screened?"));
    assert!(prompts[1].contains(&rows[1].retrieved_context));

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let written: Vec<EvalRow> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(written, rows);
}

#[tokio::test]
async fn test_evaluate_empty_index_uses_placeholders() {
    let dir = tempdir().unwrap();
    let index = Arc::new(
        VectorIndex::new(dir.path().join("index"), TEST_DIM, DistanceMetric::InnerProduct)
            .unwrap(),
    );
    let generator = Arc::new(MockGenerator::default());
    let evaluator = Evaluator::new(
        Arc::new(service(index, Arc::new(OverlapReranker::default()))),
        Arc::new(ReportService::new(
            Arc::clone(&generator) as Arc<dyn Generator>
        )),
    );

    let rows = evaluator
        .evaluate(&["anything at all".to_string()])
        .await
        .unwrap();

    assert_eq!(rows[0].retrieved_context, NO_CONTEXT);
    assert_eq!(rows[0].answer, NO_ANSWER);
    assert!(generator.prompts.lock().unwrap().is_empty());
}

#[test]
fn test_chunking_covers_whole_text() {
    let chunker = FixedSizeChunker::new(ChunkConfig {
        chunk_size: 100,
        overlap: 20,
    })
    .unwrap();
    let text = "x".repeat(1_000);

    let chunks = chunker.split(&text);

    assert_eq!(chunks.first().unwrap().char_range.start, 0);
    assert_eq!(chunks.last().unwrap().char_range.end, 1_000);
    for pair in chunks.windows(2) {
        assert!(pair[1].char_range.start <= pair[0].char_range.end);
        assert!(pair[1].char_range.start > pair[0].char_range.start);
    }
    assert!(chunks.iter().all(|c| c.content.chars().count() <= 100));
    assert_eq!(chunks.len(), 13);
}
