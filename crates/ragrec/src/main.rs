//! # ragrec CLI
//!
//! Command-line interface for ragrec, a retrieval-augmented recommendation
//! engine.
//!
//! ## Commands
//!
//! - `ragrec ingest <CSV>` - Chunk, embed and index a source table
//! - `ragrec recommend <VALUE>` - Retrieve and rerank candidates for a text or identifier
//! - `ragrec evaluate <QUESTIONS> <OUTPUT>` - Answer a question table with retrieved context
//! - `ragrec report <PROMPT>` - Forward a prompt to the generator
//! - `ragrec status` - Show index statistics
//!
//! ## Examples
//!
//! ```bash
//! # Build the index
//! ragrec ingest labs.csv
//!
//! # Recommend by free text, restricted to one category
//! ragrec recommend "tired, low iron" --category blood
//!
//! # Recommend by identifier, JSON output
//! ragrec --format json recommend ferritin.pdf --input-type id
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragrec_core::{Embedder, Generator, RankedResult, Reranker};
use ragrec_embed::{EmbedderPool, EmbeddingCache, HashingEmbedder};
use ragrec_pipeline::{Evaluator, IngestConfig, Ingestor};
use ragrec_query::{Manager, RecommendationService, ReportService, RerankCoordinator, Retriever};
use ragrec_remote::{ChatGenerator, HttpReranker, OpenAiEmbedder};
use ragrec_store::{ArtifactPaths, VectorIndex};
use serde::Serialize;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::{Config, EmbeddingProvider};

#[derive(Parser)]
#[command(name = "ragrec")]
#[command(about = "Retrieval-augmented recommendation over chunked documents")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/ragrec/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index a CSV source table
    Ingest {
        /// CSV with domain, file_name, url and text columns
        input: PathBuf,
    },

    /// Recommend candidates for a text or an identifier
    Recommend {
        /// Query text or identifier
        value: String,

        /// Input type: `text`, `id`, or a configured numeric code
        #[arg(short = 't', long, default_value = "text")]
        input_type: String,

        /// Only keep candidates of this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Answer every question of a CSV table with retrieved context
    Evaluate {
        /// CSV with a `question` column
        input: PathBuf,

        /// Output CSV (question, retrieved_context, answer)
        output: PathBuf,
    },

    /// Forward a prompt to the generator
    Report {
        /// Prompt text
        #[arg(required_unless_present = "file")]
        prompt: Option<String>,

        /// Read the prompt from a file
        #[arg(long, conflicts_with = "prompt")]
        file: Option<PathBuf>,
    },

    /// Show index status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for recommendations.
#[derive(Serialize)]
struct RecommendOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    results: Vec<ResultItem>,
}

#[derive(Serialize)]
struct ResultItem {
    rank: usize,
    id: String,
    category: String,
    url: String,
    similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
    content: String,
}

/// Output structure for status.
#[derive(Serialize)]
struct StatusOutput {
    path: String,
    rows: usize,
    dimension: usize,
    metric: String,
    index_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,
}

/// Open the persisted index named by the configuration.
async fn open_index(config: &Config) -> Result<Arc<VectorIndex>> {
    let path = config.index_path()?;
    if !ArtifactPaths::from_base(&path).exists() {
        anyhow::bail!(
            "Index not found at {}. Run 'ragrec ingest <CSV>' first.",
            path.display()
        );
    }
    let index = VectorIndex::open(&path)
        .await
        .with_context(|| format!("Failed to open index at {}", path.display()))?;
    index
        .ensure_shape(config.index.dimension, config.index.metric)
        .await
        .context("Index does not match the configured dimension and metric")?;
    Ok(Arc::new(index))
}

/// Create the configured embedding collaborator.
fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let dimension = config.index.dimension;
    let embedder: Arc<dyn Embedder> = match config.embedding.provider {
        EmbeddingProvider::Remote => Arc::new(
            OpenAiEmbedder::new(&config.embedding.settings(), dimension)
                .context("Failed to create embedding client")?,
        ),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(dimension)),
    };
    info!(
        "Embedding with {} (dimension {})",
        embedder.model_name(),
        dimension
    );
    Ok(embedder)
}

fn create_recommender(config: &Config, index: Arc<VectorIndex>) -> Result<RecommendationService> {
    let mut embedder = create_embedder(config)?;
    if config.embedding.cache_size > 0 {
        embedder = Arc::new(EmbeddingCache::with_capacity(
            embedder,
            config.embedding.cache_size,
        ));
    }
    let reranker: Arc<dyn Reranker> = Arc::new(
        HttpReranker::new(&config.reranker.settings())
            .context("Failed to create reranker client")?,
    );

    let retriever = Retriever::new(index, embedder, config.retrieval.top_k)
        .with_embedding_config(config.embedding.embedding_config());
    let coordinator = RerankCoordinator::new(
        reranker,
        config.retrieval.rerank_top_k,
        config.columns.clone(),
    );
    Ok(
        RecommendationService::new(retriever, coordinator, config.columns.clone())
            .with_input_mode(config.input_mode),
    )
}

fn create_reporter(config: &Config) -> Result<ReportService> {
    let generator: Arc<dyn Generator> = Arc::new(
        ChatGenerator::new(&config.generator.settings(), config.generator.options())
            .context("Failed to create generator client")?,
    );
    Ok(ReportService::new(generator))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        Config::load_from(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        Config::load().context("Failed to load config")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Ingest { input } => {
            if !input.exists() {
                anyhow::bail!("Input table does not exist: {}", input.display());
            }

            let path = config.index_path()?;
            let index = Arc::new(
                VectorIndex::open_or_create(&path, config.index.dimension, config.index.metric)
                    .await
                    .with_context(|| format!("Failed to open index at {}", path.display()))?,
            );
            let embedder = Arc::new(EmbedderPool::new(
                create_embedder(&config)?,
                config.embedding.max_concurrent,
            ));
            let ingestor = Ingestor::new(
                Arc::clone(&index),
                embedder,
                IngestConfig {
                    chunk_config: config.chunking.chunk_config(),
                    embed_config: config.embedding.embedding_config(),
                },
            )?;

            let report = ingestor
                .ingest_csv(&input)
                .await
                .with_context(|| format!("Failed to ingest {}", input.display()))?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Text => {
                    println!(
                        "Ingested {} chunks from {} rows ({} skipped)",
                        report.chunks_added, report.rows_read, report.rows_skipped
                    );
                    println!("Index: {} ({} rows)", path.display(), index.len().await);
                }
            }
        }

        Commands::Recommend {
            value,
            input_type,
            category,
        } => {
            let input_type = config.input_mode.parse(&input_type)?;
            let index = open_index(&config).await?;
            let manager = Manager::Recommendation(create_recommender(&config, index)?);

            let result = manager
                .answer_candidates(&value, input_type, category.as_deref())
                .await
                .context("Recommendation failed")?;

            match cli.format {
                OutputFormat::Json => {
                    let output = recommend_output(result.as_ref(), &config);
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    print!("{}", render_text(result.as_ref(), &config));
                }
            }
        }

        Commands::Evaluate { input, output } => {
            if !input.exists() {
                anyhow::bail!("Question table does not exist: {}", input.display());
            }

            let index = open_index(&config).await?;
            let evaluator = Evaluator::new(
                Arc::new(create_recommender(&config, index)?),
                Arc::new(create_reporter(&config)?),
            )
            .with_template(config.prompt.template.clone());

            let rows = evaluator
                .evaluate_csv(&input, &output)
                .await
                .context("Evaluation failed")?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                }
                OutputFormat::Text => {
                    println!("Wrote {} rows to {}", rows.len(), output.display());
                }
            }
        }

        Commands::Report { prompt, file } => {
            let prompt = match (prompt, file) {
                (Some(prompt), _) => prompt,
                (None, Some(file)) => std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                (None, None) => anyhow::bail!("Provide a prompt or --file"),
            };
            let manager = Manager::Report(create_reporter(&config)?);

            let answer = manager.report(&prompt).await.context("Report failed")?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "report": answer }));
                }
                OutputFormat::Text => println!("{answer}"),
            }
        }

        Commands::Status => {
            let path = config.index_path()?;

            if !ArtifactPaths::from_base(&path).exists() {
                match cli.format {
                    OutputFormat::Json => {
                        println!(r#"{{"error": "Index not found"}}"#);
                    }
                    OutputFormat::Text => {
                        println!("Index not found at {}", path.display());
                        println!("Run 'ragrec ingest <CSV>' to create it.");
                    }
                }
                return Ok(());
            }

            let index = VectorIndex::open(&path)
                .await
                .with_context(|| format!("Failed to open index at {}", path.display()))?;
            let stats = index.stats().await;

            match cli.format {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        path: path.to_string_lossy().to_string(),
                        rows: stats.rows,
                        dimension: stats.dimension,
                        metric: stats.metric.to_string(),
                        index_size_bytes: stats.size_bytes,
                        saved_at: stats.saved_at.map(|t| t.to_rfc3339()),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Index Status for {}", path.display());
                    println!("  Rows:      {}", stats.rows);
                    println!("  Dimension: {}", stats.dimension);
                    println!("  Metric:    {}", stats.metric);
                    println!("  Size:      {} bytes", stats.size_bytes);
                    if let Some(saved) = stats.saved_at {
                        println!("  Saved:     {}", saved.format("%Y-%m-%d %H:%M:%S"));
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

fn recommend_output(result: Option<&RankedResult>, config: &Config) -> RecommendOutput {
    let Some(result) = result else {
        return RecommendOutput {
            query: None,
            results: Vec::new(),
        };
    };
    let columns = &config.columns;
    RecommendOutput {
        query: Some(result.query.clone()),
        results: result
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| ResultItem {
                rank: i + 1,
                id: c.field(&columns.id_column).unwrap_or_default().to_string(),
                category: c
                    .field(&columns.category_column)
                    .unwrap_or_default()
                    .to_string(),
                url: c.record.url.clone(),
                similarity: c.score,
                score: c.rerank_score,
                content: truncate(c.field(&columns.target_column).unwrap_or_default(), 200),
            })
            .collect(),
    }
}

/// Numbered candidate lines, or a single line when nothing matched.
fn render_text(result: Option<&RankedResult>, config: &Config) -> String {
    let Some(result) = result else {
        return "No matching candidates found.\n".to_string();
    };
    let columns = &config.columns;
    let mut out = String::new();
    for (i, candidate) in result.candidates.iter().enumerate() {
        let id = candidate.field(&columns.id_column).unwrap_or_default();
        let score = candidate.rerank_score.unwrap_or(candidate.score);
        let _ = writeln!(out, "{}. {} (score: {:.3})", i + 1, id, score);
    }
    out
}

/// Truncate a string to max length, adding ellipsis if needed.
fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_chars {
        s
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
