//! Configuration handling for ragrec.
//!
//! Every field has a default, so an empty or missing config file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use ragrec_core::{ChunkConfig, ColumnMapping, DistanceMetric, EmbeddingConfig, InputMode};
use ragrec_pipeline::PromptTemplate;
use ragrec_remote::{ChatOptions, EndpointSettings};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval and rerank sizes
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Column names read from chunk records
    #[serde(default)]
    pub columns: ColumnMapping,

    /// Numeric input type codes
    #[serde(default)]
    pub input_mode: InputMode,

    /// Embedding collaborator
    #[serde(default)]
    pub embedding: EmbeddingSection,

    /// Reranker collaborator
    #[serde(default)]
    pub reranker: RerankerSection,

    /// Generator collaborator
    #[serde(default)]
    pub generator: GeneratorSection,

    /// Evaluation prompt
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Index-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base path of the index artifacts (default: `<data dir>/index`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Vector dimension, fixed when the index is created
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Similarity metric, fixed when the index is created
    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_dimension() -> usize {
    384
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: None,
            dimension: default_dimension(),
            metric: DistanceMetric::default(),
        }
    }
}

/// Chunking-related configuration, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    100
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

/// Retrieval-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates returned by similarity search
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Candidates kept after reranking
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,
}

fn default_top_k() -> usize {
    20
}

fn default_rerank_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rerank_top_k: default_rerank_top_k(),
        }
    }
}

/// Where embeddings come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// An OpenAI-compatible `/embeddings` endpoint
    #[default]
    Remote,
    /// Offline feature hashing, no model required
    Hashing,
}

/// Embedding collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSection {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent embedding requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Unit-normalise embeddings
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Query embeddings kept in memory (0 disables the cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    32
}

fn default_max_concurrent() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    1024
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            base_url: default_base_url(),
            model: default_embedding_model(),
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
            max_concurrent: default_max_concurrent(),
            normalize: default_true(),
            cache_size: default_cache_size(),
        }
    }
}

impl EmbeddingSection {
    pub fn settings(&self) -> EndpointSettings {
        endpoint(
            &self.base_url,
            &self.model,
            self.api_key_env.as_deref(),
            self.timeout_secs,
        )
    }

    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            normalize: self.normalize,
            batch_size: self.batch_size,
        }
    }
}

/// Reranker collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_reranker_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_reranker_model() -> String {
    "BAAI/bge-reranker-v2-m3".to_string()
}

impl Default for RerankerSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_reranker_model(),
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RerankerSection {
    pub fn settings(&self) -> EndpointSettings {
        endpoint(
            &self.base_url,
            &self.model,
            self.api_key_env.as_deref(),
            self.timeout_secs,
        )
    }
}

/// Generator collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_generator_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

fn default_generator_model() -> String {
    "Qwen/Qwen2.5-7B-Instruct".to_string()
}

fn default_generator_timeout_secs() -> u64 {
    120
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_generator_model(),
            api_key_env: None,
            timeout_secs: default_generator_timeout_secs(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl GeneratorSection {
    pub fn settings(&self) -> EndpointSettings {
        endpoint(
            &self.base_url,
            &self.model,
            self.api_key_env.as_deref(),
            self.timeout_secs,
        )
    }

    pub fn options(&self) -> ChatOptions {
        ChatOptions {
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn endpoint(
    base_url: &str,
    model: &str,
    api_key_env: Option<&str>,
    timeout_secs: u64,
) -> EndpointSettings {
    let mut settings = EndpointSettings::new(base_url, model);
    settings.api_key = api_key_env.and_then(|var| std::env::var(var).ok());
    settings.timeout = Duration::from_secs(timeout_secs);
    settings
}

/// Evaluation prompt configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptConfig {
    /// Template with `{context}` and `{question}` placeholders
    #[serde(default)]
    pub template: PromptTemplate,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipelines cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.chunking.chunk_config().validate()?;
        if self.index.dimension == 0 {
            anyhow::bail!("index.dimension must be positive");
        }
        if self.retrieval.top_k == 0 || self.retrieval.rerank_top_k == 0 {
            anyhow::bail!("retrieval.top_k and retrieval.rerank_top_k must be positive");
        }
        if self.input_mode.identifier == self.input_mode.text {
            anyhow::bail!(
                "input_mode codes must differ (both are {})",
                self.input_mode.text
            );
        }
        Ok(())
    }

    /// Default config file path.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Base path of the index artifacts.
    pub fn index_path(&self) -> Result<PathBuf> {
        match &self.index.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()
                .context("Failed to get data directory")?
                .join("index")),
        }
    }

    /// Commented sample configuration.
    pub fn sample_toml() -> &'static str {
        SAMPLE_TOML
    }
}

const SAMPLE_TOML: &str = r#"# ragrec configuration

[index]
# Base path of the index artifacts (<path>.chunks.json, <path>.vectors.<digest>)
# path = "/var/lib/ragrec/index"
dimension = 384
# inner_product, l2 or cosine
metric = "inner_product"

[chunking]
chunk_size = 1000
overlap = 100

[retrieval]
top_k = 20
rerank_top_k = 5

[columns]
id_column = "file_name"
category_column = "domain"
target_column = "text"

[input_mode]
identifier = 0
text = 1

[embedding]
# remote or hashing
provider = "remote"
base_url = "http://localhost:8000/v1"
model = "BAAI/bge-small-en-v1.5"
# api_key_env = "EMBEDDING_API_KEY"
timeout_secs = 60
batch_size = 32
max_concurrent = 4
normalize = true
cache_size = 1024

[reranker]
base_url = "http://localhost:8000/v1"
model = "BAAI/bge-reranker-v2-m3"
timeout_secs = 60

[generator]
base_url = "http://localhost:8000/v1"
model = "Qwen/Qwen2.5-7B-Instruct"
timeout_secs = 120
# system_prompt = "You are a laboratory test assistant."
# temperature = 0.2
# max_tokens = 512

[prompt]
# template = "Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"

[logging]
level = "info"
"#;

/// Get the XDG data directory for ragrec.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("RAGREC_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "ragrec").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the XDG config directory for ragrec.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("RAGREC_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "ragrec").map(|dirs| dirs.config_dir().to_path_buf())
}
