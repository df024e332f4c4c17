//! Configuration management for awesome-index
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::RepoIdentity;
use crate::parse::ParseOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `postgres://...` or `memory://`
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Upstream repository client configuration
    #[serde(default)]
    pub github: GitHubConfig,

    /// Embedding generator configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Freshness and fetch fan-out configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Default parse options for awesome-list documents
    #[serde(default)]
    pub parse: ParseConfig,

    /// RPC server configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Per-list parse overrides
    #[serde(default)]
    pub lists: Vec<ListConfig>,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// GitHub client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Environment variable name for the API token
    #[serde(default = "default_github_token_env")]
    pub token_env: String,

    /// Sustained request budget
    #[serde(default = "default_github_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Requests allowed back to back before throttling kicks in
    #[serde(default = "default_github_burst")]
    pub burst: u32,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding backend base URL
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model and the vector column)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Environment variable name for the backend API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Sustained request budget
    #[serde(default = "default_embedding_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Requests allowed back to back before throttling kicks in
    #[serde(default = "default_embedding_burst")]
    pub burst: u32,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Freshness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Collection TTL; zero or negative never refetches
    #[serde(default = "default_collection_ttl_secs")]
    pub collection_ttl_secs: i64,

    /// Project stats TTL; zero or negative never refetches
    #[serde(default = "default_stats_ttl_secs")]
    pub stats_ttl_secs: i64,

    /// Embedding TTL for the sweep; negative only backfills missing vectors
    #[serde(default = "default_embedding_ttl_secs")]
    pub embedding_ttl_secs: i64,

    /// Repositories fetched concurrently by ListCollections
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Delete categories/projects that vanished from a re-fetched document
    #[serde(default)]
    pub reconcile_orphans: bool,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Limit used when the caller passes zero or less
    #[serde(default = "default_search_limit")]
    pub default_limit: i64,

    /// Upper bound on any requested limit
    #[serde(default = "default_search_max_limit")]
    pub max_limit: i64,
}

/// Parse options shared by every list without an override
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Heading after which categories start
    #[serde(default)]
    pub start_section: Option<String>,

    /// Heading at which parsing stops
    #[serde(default)]
    pub end_section: Option<String>,

    /// Whether level-3+ headings become their own categories
    #[serde(default = "default_sub_headings_as_categories")]
    pub sub_headings_as_categories: bool,
}

/// RPC server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Deadline applied to every request
    #[serde(default = "default_rpc_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Parse override for one list repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_list_hostname")]
    pub hostname: String,
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub start_section: Option<String>,
    #[serde(default)]
    pub end_section: Option<String>,
    #[serde(default)]
    pub sub_headings_as_categories: Option<bool>,
}

fn default_list_hostname() -> String {
    crate::models::DEFAULT_HOSTNAME.to_string()
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for awesome-index data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            github: GitHubConfig::default(),
            embedding: EmbeddingConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            parse: ParseConfig::default(),
            rpc: RpcConfig::default(),
            lists: Vec::new(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token_env: default_github_token_env(),
            requests_per_minute: default_github_requests_per_minute(),
            burst: default_github_burst(),
            user_agent: default_user_agent(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            api_key_env: default_embedding_api_key_env(),
            requests_per_minute: default_embedding_requests_per_minute(),
            burst: default_embedding_burst(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            collection_ttl_secs: default_collection_ttl_secs(),
            stats_ttl_secs: default_stats_ttl_secs(),
            embedding_ttl_secs: default_embedding_ttl_secs(),
            fetch_concurrency: default_fetch_concurrency(),
            reconcile_orphans: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            max_limit: default_search_max_limit(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_rpc_request_timeout(),
        }
    }
}

impl GitHubConfig {
    /// Read the API token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        read_secret(&self.token_env)
    }
}

impl EmbeddingConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        read_secret(&self.api_key_env)
    }
}

fn read_secret(env_name: &str) -> Option<String> {
    if env_name.is_empty() {
        return None;
    }
    std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
}

impl CacheConfig {
    /// Collection freshness window; `None` means cached data never expires
    pub fn collection_ttl(&self) -> Option<Duration> {
        cache_ttl(self.collection_ttl_secs)
    }

    /// Stats freshness window; `None` means cached data never expires
    pub fn stats_ttl(&self) -> Option<Duration> {
        cache_ttl(self.stats_ttl_secs)
    }

    /// Embedding age limit; `None` means existing embeddings are never refreshed
    pub fn embedding_ttl(&self) -> Option<Duration> {
        embedding_ttl(self.embedding_ttl_secs)
    }
}

/// TTL ≤ 0 means infinite freshness
pub fn cache_ttl(secs: i64) -> Option<Duration> {
    if secs <= 0 {
        None
    } else {
        Some(Duration::from_secs(secs as u64))
    }
}

/// TTL < 0 disables refreshing; 0 refreshes everything
pub fn embedding_ttl(secs: i64) -> Option<Duration> {
    if secs < 0 {
        None
    } else {
        Some(Duration::from_secs(secs as u64))
    }
}

impl ParseConfig {
    pub fn options(&self) -> ParseOptions {
        ParseOptions {
            start_section: self.start_section.clone(),
            end_section: self.end_section.clone(),
            sub_headings_as_categories: self.sub_headings_as_categories,
        }
    }
}

impl ListConfig {
    pub fn identity(&self) -> Result<RepoIdentity> {
        RepoIdentity::new(&self.hostname, &self.owner, &self.repo)
    }

    /// Merge this override on top of the default options
    pub fn options(&self, base: &ParseOptions) -> ParseOptions {
        ParseOptions {
            start_section: self
                .start_section
                .clone()
                .or_else(|| base.start_section.clone()),
            end_section: self.end_section.clone().or_else(|| base.end_section.clone()),
            sub_headings_as_categories: self
                .sub_headings_as_categories
                .unwrap_or(base.sub_headings_as_categories),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.awesome-index)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".awesome-index")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, using defaults when no file exists
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.github.requests_per_minute == 0 || self.embedding.requests_per_minute == 0 {
            return Err(Error::Config(
                "requests_per_minute must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.cache.fetch_concurrency == 0 {
            return Err(Error::Config(
                "cache.fetch_concurrency must be positive".to_string(),
            ));
        }

        if self.search.default_limit <= 0 || self.search.max_limit < self.search.default_limit {
            return Err(Error::Config(
                "search.default_limit must be positive and <= search.max_limit".to_string(),
            ));
        }

        for list in &self.lists {
            list.identity().map_err(|e| {
                Error::Config(format!(
                    "invalid [[lists]] entry {}/{}: {}",
                    list.owner, list.repo, e
                ))
            })?;
        }

        Ok(())
    }
}
