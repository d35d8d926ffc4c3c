use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    #[serde(default = "default_kb_path")]
    pub path: PathBuf,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            path: default_kb_path(),
        }
    }
}

fn default_kb_path() -> PathBuf {
    PathBuf::from("./knowledge_base.json")
}

/// Feature extraction used by the TF-IDF retriever.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// Whole-word tokens (optionally word n-grams).
    Word,
    /// Character n-grams taken inside word boundaries.
    CharWb,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopWords {
    English,
    None,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_analyzer")]
    pub analyzer: AnalyzerKind,
    #[serde(default = "default_ngram")]
    pub ngram_min: usize,
    #[serde(default = "default_ngram")]
    pub ngram_max: usize,
    #[serde(default = "default_stop_words")]
    pub stop_words: StopWords,
    /// A fact matches only when its similarity is strictly above this.
    #[serde(default)]
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            analyzer: default_analyzer(),
            ngram_min: default_ngram(),
            ngram_max: default_ngram(),
            stop_words: default_stop_words(),
            min_similarity: 0.0,
        }
    }
}

fn default_analyzer() -> AnalyzerKind {
    AnalyzerKind::Word
}
fn default_ngram() -> usize {
    1
}
fn default_stop_words() -> StopWords {
    StopWords::English
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_answer_len")]
    pub max_answer_len: usize,
    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
    #[serde(default = "default_context_label")]
    pub context_label: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            top_k: default_top_k(),
            max_answer_len: default_max_answer_len(),
            max_seq_len: default_max_seq_len(),
            min_answer_chars: default_min_answer_chars(),
            context_label: default_context_label(),
        }
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./DNN_Model")
}
fn default_top_k() -> usize {
    3
}
fn default_max_answer_len() -> usize {
    60
}
fn default_max_seq_len() -> usize {
    384
}
fn default_min_answer_chars() -> usize {
    3
}
fn default_context_label() -> String {
    "Agent".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_poll_timeout_secs() -> u64 {
    30
}

impl BotConfig {
    /// Base URL of the QA service, with `ML_API_URL` taking precedence.
    ///
    /// Older deployments point `ML_API_URL` straight at the predict route, so
    /// a trailing `/predict` is stripped.
    pub fn resolved_api_url(&self) -> String {
        let raw = std::env::var("ML_API_URL").unwrap_or_else(|_| self.api_url.clone());
        normalize_api_url(&raw)
    }
}

fn normalize_api_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/predict")
        .unwrap_or(trimmed)
        .to_string()
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    if r.ngram_min == 0 || r.ngram_min > r.ngram_max {
        anyhow::bail!(
            "retrieval.ngram_min/ngram_max must satisfy 1 <= min <= max (got {}..{})",
            r.ngram_min,
            r.ngram_max
        );
    }
    if !(0.0..1.0).contains(&r.min_similarity) {
        anyhow::bail!("retrieval.min_similarity must be in [0.0, 1.0)");
    }

    let m = &config.model;
    if m.top_k == 0 {
        anyhow::bail!("model.top_k must be >= 1");
    }
    if m.max_answer_len == 0 {
        anyhow::bail!("model.max_answer_len must be >= 1");
    }
    if m.max_seq_len < 16 {
        anyhow::bail!("model.max_seq_len must be >= 16");
    }

    if config.bot.request_timeout_secs == 0 {
        anyhow::bail!("bot.request_timeout_secs must be > 0");
    }

    Ok(())
}
