//! TOML configuration.
//!
//! The configuration is loaded once at startup, validated, and then passed by
//! reference to every component at construction time. Nothing reads global
//! settings after [`load_config`] returns.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory of source documents (`.docx`, `.txt`).
    pub raw_dir: PathBuf,
    /// Destination for the debug export written before indexing.
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("./data/processed")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the dense vector index. Deleted and recreated on rebuild.
    pub vector_dir: PathBuf,
    /// Path of the serialized keyword index.
    pub keyword_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            device: default_device(),
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_device() -> String {
    "cpu".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of dense (vector) results fetched per query.
    #[serde(default = "default_candidate_k_vector")]
    pub candidate_k_vector: usize,
    /// Number of keyword (BM25) results fetched per query.
    #[serde(default = "default_candidate_k_keyword")]
    pub candidate_k_keyword: usize,
    /// Paraphrase the user query into legal vocabulary before searching.
    #[serde(default = "default_true")]
    pub rewrite_query: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_k_vector: default_candidate_k_vector(),
            candidate_k_keyword: default_candidate_k_keyword(),
            rewrite_query: true,
        }
    }
}

fn default_candidate_k_vector() -> usize {
    40
}
fn default_candidate_k_keyword() -> usize {
    15
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_rerank_batch_size")]
    pub batch_size: usize,
    /// Number of units kept after reranking.
    #[serde(default = "default_final_k")]
    pub final_k: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            model: default_rerank_model(),
            batch_size: default_rerank_batch_size(),
            final_k: default_final_k(),
        }
    }
}

fn default_rerank_model() -> String {
    "bge-reranker-v2-m3".to_string()
}
fn default_rerank_batch_size() -> usize {
    8
}
fn default_final_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Supporting citations printed under each answer.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_sources: default_max_sources(),
        }
    }
}

fn default_max_sources() -> usize {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.candidate_k_vector == 0 && config.retrieval.candidate_k_keyword == 0 {
        bail!("retrieval.candidate_k_vector and retrieval.candidate_k_keyword cannot both be 0");
    }

    // Validate rerank
    if config.rerank.batch_size == 0 {
        bail!("rerank.batch_size must be > 0");
    }
    if config.rerank.final_k == 0 {
        bail!("rerank.final_k must be >= 1");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }
    match config.embedding.device.as_str() {
        "cpu" | "cuda" => {}
        other => bail!("Unknown embedding.device: '{}'. Must be cpu or cuda.", other),
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "gemini" | "openai" | "disabled" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be gemini, openai, or disabled.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}
