//! TOML configuration.
//!
//! Every section carries serde defaults, so an empty file (or
//! [`Config::default`]) is a complete configuration. Secrets are never stored
//! in the file: each remote service names the environment variable its key
//! is read from.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Upper bound on vectors per upsert call accepted by the index service.
pub const MAX_UPSERT_BATCH: usize = 100;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub index: IndexConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Environment variable holding the static bearer token.
    pub token_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            token_env: "DOCQA_BEARER_TOKEN".to_string(),
        }
    }
}

impl ServerConfig {
    /// Reads the bearer token from the configured environment variable.
    pub fn bearer_token(&self) -> Result<String> {
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("{} environment variable not set", self.token_env))?;
        if token.trim().is_empty() {
            bail!("{} must not be empty", self.token_env);
        }
        Ok(token)
    }
}

/// Chunk window sizes, measured in characters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 200,
        }
    }
}

impl ChunkingConfig {
    /// Rejects window settings under which the chunker could not advance.
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }
        if self.overlap_chars >= self.max_chars {
            bail!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                self.overlap_chars,
                self.max_chars
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dims: usize,
    /// Try the remote embedding endpoint first.
    pub remote: bool,
    /// Fall back to LLM-extracted concept hashing before the pure hash.
    pub concepts: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dims: 1536,
            remote: true,
            concepts: true,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// OpenAI-compatible service used for chat completions and embeddings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub concept_max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            concept_max_tokens: 50,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("{} environment variable not set", self.api_key_env))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// `"pinecone"` or `"memory"`.
    pub provider: String,
    pub name: String,
    pub control_url: String,
    pub api_key_env: String,
    pub api_version: String,
    pub cloud: String,
    pub region: String,
    pub upsert_batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub ready_timeout_secs: u64,
    pub ready_poll_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: "pinecone".to_string(),
            name: "docqa-index".to_string(),
            control_url: "https://api.pinecone.io".to_string(),
            api_key_env: "PINECONE_API_KEY".to_string(),
            api_version: "2024-07".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            upsert_batch_size: MAX_UPSERT_BATCH,
            timeout_secs: 30,
            max_retries: 3,
            ready_timeout_secs: 60,
            ready_poll_secs: 2,
        }
    }
}

impl IndexConfig {
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("{} environment variable not set", self.api_key_env))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        if !(1..=MAX_UPSERT_BATCH).contains(&self.index.upsert_batch_size) {
            bail!(
                "index.upsert_batch_size must be in [1, {}]",
                MAX_UPSERT_BATCH
            );
        }

        match self.index.provider.as_str() {
            "pinecone" | "memory" => {}
            other => bail!(
                "Unknown index provider: '{}'. Must be pinecone or memory.",
                other
            ),
        }

        Ok(())
    }
}

/// Loads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
