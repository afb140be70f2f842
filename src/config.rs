//! TOML configuration.
//!
//! Every section is optional; missing sections and fields take the
//! defaults below. [`load_config`] validates the chunking and retrieval
//! sizes before handing the config to the rest of the app.

use anyhow::{bail, Context, Result};
use classroom_rag_core::models::ChunkOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkOptions,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub classroom: ClassroomConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/classroom.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Prefix for every key, as `<namespace>:<key>`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "classroom_ai".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound (chars) for the retrieved-excerpt part of the context.
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_max_chars: default_context_max_chars(),
        }
    }
}

fn default_top_k() -> usize {
    classroom_rag_core::retrieve::DEFAULT_TOP_K
}
fn default_context_max_chars() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_llm_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_llm_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}
fn default_api_key_env() -> String {
    "GEM_KEY".to_string()
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassroomConfig {
    #[serde(default = "default_classroom_base")]
    pub base_url: String,
}

impl Default for ClassroomConfig {
    fn default() -> Self {
        Self {
            base_url: default_classroom_base(),
        }
    }
}

fn default_classroom_base() -> String {
    "https://classroom.googleapis.com/v1".to_string()
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
    "127.0.0.1:7341".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }
        if c.min_chars > c.max_chars {
            bail!(
                "chunking.min_chars ({}) must be <= chunking.max_chars ({})",
                c.min_chars,
                c.max_chars
            );
        }
        if c.max_chars > c.hard_max_chars {
            bail!(
                "chunking.max_chars ({}) must be <= chunking.hard_max_chars ({})",
                c.max_chars,
                c.hard_max_chars
            );
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.context_max_chars == 0 {
            bail!("retrieval.context_max_chars must be > 0");
        }

        if self.storage.namespace.is_empty() || self.storage.namespace.contains(':') {
            bail!("storage.namespace must be non-empty and must not contain ':'");
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
