use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::search::RetrieveOptions;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub kgsearch: KgsearchConfig,
    pub knowledge: KnowledgeConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Process-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct KgsearchConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for KgsearchConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Knowledge-graph service connection
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeConfig {
    pub base_url: String,
    pub kb_id: i64,
    #[serde(default = "default_knowledge_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_knowledge_retries")]
    pub max_retries: usize,
    /// Number of `retrieve_knowledge` responses to memoize; 0 disables the cache.
    #[serde(default)]
    pub cache_capacity: usize,
}

/// Completion service used for planning and evaluation
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_retries")]
    pub max_retries: usize,
}

/// Defaults for each retrieval session
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_true")]
    pub enable_optimization: bool,
    #[serde(default)]
    pub enable_tracing: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            max_depth: default_max_depth(),
            max_iterations: default_max_iterations(),
            concurrency: default_concurrency(),
            enable_optimization: true,
            enable_tracing: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_knowledge_timeout() -> u64 {
    60
}

fn default_knowledge_retries() -> usize {
    5
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_llm_retries() -> usize {
    3
}

fn default_top_k() -> usize {
    10
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_max_depth() -> usize {
    1
}

fn default_max_iterations() -> usize {
    5
}

fn default_concurrency() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KGSEARCH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KGSEARCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&config_str)?;
        config.validate_env()?;

        Ok(config)
    }

    /// Parse and validate a TOML document without touching the environment
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        for (section, raw) in [("knowledge", &self.knowledge.base_url), ("llm", &self.llm.base_url)] {
            let parsed = url::Url::parse(raw)
                .with_context(|| format!("{}.base_url is not a valid URL: {}", section, raw))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                anyhow::bail!("{}.base_url must use http or https: {}", section, raw);
            }
        }

        validate_retrieve_options(&self.retrieve_options())
            .context("Invalid [retrieval] section")?;

        Ok(())
    }

    /// Check that secrets referenced by the config are present
    fn validate_env(&self) -> Result<()> {
        std::env::var(&self.llm.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your completion API key.",
                self.llm.api_key_env
            )
        })?;
        Ok(())
    }

    /// Retrieval session options built from the `[retrieval]` section
    pub fn retrieve_options(&self) -> RetrieveOptions {
        RetrieveOptions {
            top_k: self.retrieval.top_k,
            similarity_threshold: self.retrieval.similarity_threshold,
            max_depth: self.retrieval.max_depth,
            max_iterations: self.retrieval.max_iterations,
            concurrency: self.retrieval.concurrency,
            enable_tracing: self.retrieval.enable_tracing,
            enable_optimization: self.retrieval.enable_optimization,
        }
    }
}

/// Range checks shared by the `[retrieval]` section and CLI overrides
pub fn validate_retrieve_options(options: &RetrieveOptions) -> Result<()> {
    if options.top_k == 0 {
        anyhow::bail!("top_k must be greater than 0");
    }

    if !(0.0..=1.0).contains(&options.similarity_threshold) {
        anyhow::bail!("similarity_threshold must be between 0.0 and 1.0");
    }

    if options.concurrency == 0 {
        anyhow::bail!("concurrency must be greater than 0");
    }

    Ok(())
}
