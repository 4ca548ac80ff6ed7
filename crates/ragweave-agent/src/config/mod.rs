//! Configuration loading for ragweave.
//! Reads ragweave.toml from the current directory or the path named by
//! the RAGWEAVE_CONFIG env var.

use ragweave_provider::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ai: AiConfig,
    pub storage: StorageConfig,
    pub conversation_storage: Option<StorageConfig>,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub file_watcher: FileWatcherConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AiProvider {
    OpenAi,
    Anthropic,
    Gemini,
    AzureOpenAi,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_endpoint: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_message: Option<String>,
    pub api_version: Option<String>,
    pub embedding_min_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StorageProvider {
    InMemory,
    Sqlite,
    Redis,
    Qdrant,
    FileSystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_max_chunk_size() -> usize { 1000 }
fn default_min_chunk_size() -> usize { 100 }
fn default_chunk_overlap() -> usize { 200 }

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chunk_size: default_max_chunk_size(), min_chunk_size: default_min_chunk_size(), chunk_overlap: default_chunk_overlap() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

fn default_max_retry_attempts() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 1000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retry_attempts: default_max_retry_attempts(), retry_delay_ms: default_retry_delay_ms(), retry_policy: RetryPolicy::default() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub enable_fallback_providers: bool,
    #[serde(default)]
    pub fallback_providers: Vec<AiProvider>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileWatcherConfig {
    #[serde(default)]
    pub enable_file_watcher: bool,
    #[serde(default)]
    pub watched_folders: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub enable_mcp_search: bool,
    #[serde(default)]
    pub mcp_servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub database_connections: Vec<String>,
    #[serde(default)]
    pub enable_auto_schema_analysis: bool,
    #[serde(default)]
    pub enable_periodic_schema_refresh: bool,
    #[serde(default = "default_schema_refresh_interval_minutes")]
    pub default_schema_refresh_interval_minutes: u32,
}

fn default_schema_refresh_interval_minutes() -> u32 { 60 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_connections: Vec::new(),
            enable_auto_schema_analysis: false,
            enable_periodic_schema_refresh: false,
            default_schema_refresh_interval_minutes: default_schema_refresh_interval_minutes(),
        }
    }
}

mod tests;

impl Config {
    /// Loads configuration from ragweave.toml.
    /// Checks RAGWEAVE_CONFIG env var first, then the current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("RAGWEAVE_CONFIG").unwrap_or_else(|_| "ragweave.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!("Config file not found: {}\nCopy ragweave.example.toml to ragweave.toml and edit it.", path);
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
