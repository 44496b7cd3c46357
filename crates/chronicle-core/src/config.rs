use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Top-level config (`chronicle.toml` + `CHRONICLE_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronicleConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub models: ModelConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub reindex: ReindexConfig,
}

impl Default for ChronicleConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            models: ModelConfig::default(),
            analysis: AnalysisConfig::default(),
            search: SearchConfig::default(),
            reindex: ReindexConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Model Gateway provider selection and rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which generation provider to build: "anthropic" or "gemini".
    #[serde(default = "default_generation_provider")]
    pub generation_provider: String,
    #[serde(default = "default_generation_model")]
    pub model_generation_id: String,
    #[serde(default = "default_embedding_model")]
    pub model_embedding_id: String,
    #[serde(default = "default_model_dim")]
    pub model_dim: usize,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_tokens_per_minute: u64,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            generation_provider: default_generation_provider(),
            model_generation_id: default_generation_model(),
            model_embedding_id: default_embedding_model(),
            model_dim: default_model_dim(),
            rate_limit_tokens_per_minute: default_rate_limit(),
            anthropic_api_key: None,
            gemini_api_key: None,
        }
    }
}

/// Discussion Analyzer window/dormancy tuning (§6 environment table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_window_overlap")]
    pub window_overlap: usize,
    #[serde(default = "default_context_windows")]
    pub context_windows: usize,
    #[serde(default = "default_dormancy_threshold")]
    pub dormancy_threshold: u32,
    #[serde(default = "default_max_messages_per_discussion")]
    pub max_messages_per_discussion: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window_overlap: default_window_overlap(),
            context_windows: default_context_windows(),
            dormancy_threshold: default_dormancy_threshold(),
            max_messages_per_discussion: default_max_messages_per_discussion(),
        }
    }
}

/// Hybrid Searcher fusion tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            hybrid_alpha: default_hybrid_alpha(),
        }
    }
}

/// Embedding Indexer batching tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexConfig {
    #[serde(default = "default_reindex_batch_size")]
    pub reindex_batch_size: usize,
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            reindex_batch_size: default_reindex_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.chronicle/chronicle.db")
}
fn default_generation_provider() -> String {
    "anthropic".to_string()
}
fn default_generation_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_model_dim() -> usize {
    768
}
fn default_rate_limit() -> u64 {
    800_000
}
fn default_window_size() -> usize {
    300
}
fn default_window_overlap() -> usize {
    40
}
fn default_context_windows() -> usize {
    4
}
fn default_dormancy_threshold() -> u32 {
    5
}
fn default_max_messages_per_discussion() -> usize {
    500
}
fn default_similarity_threshold() -> f64 {
    0.3
}
fn default_hybrid_alpha() -> f64 {
    0.5
}
fn default_reindex_batch_size() -> usize {
    100
}
fn default_inter_batch_delay_ms() -> u64 {
    100
}

impl ChronicleConfig {
    /// Load config from a TOML file with `CHRONICLE_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, then `~/.chronicle/chronicle.toml`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ChronicleConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CHRONICLE_").split("_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.chronicle/chronicle.toml")
}
