//! Configuration loading, validation, and management for the ToF engine.
//!
//! Loads configuration from `~/.tof/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tof_core::ContextType;

/// The root configuration structure.
///
/// Maps directly to `~/.tof/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TofConfig {
    /// Semantic index backend
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding provider and profiles
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Recovery search parameters
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Retry policy for external calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// One of "memory", "file", "qdrant", "none".
    #[serde(default = "default_index_backend")]
    pub backend: String,

    #[serde(default = "default_index_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// JSONL location for the "file" backend (defaults to `~/.tof/index.jsonl`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_backend() -> String {
    "memory".into()
}
fn default_index_url() -> String {
    "http://localhost:6333".into()
}
fn default_collection() -> String {
    "contexts".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            url: default_index_url(),
            collection: default_collection(),
            api_key: None,
            path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("api_key", &redact(&self.api_key))
            .field("path", &self.path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// One of "hashing" (local, deterministic) or "openai" (any
    /// OpenAI-compatible `/embeddings` endpoint).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Embedding profiles, each serving a set of context types.
    #[serde(default = "default_profiles")]
    pub profiles: Vec<ProfileConfig>,

    /// Profile used for context types no profile claims.
    #[serde(default = "default_fallback_profile")]
    pub fallback_profile: String,
}

fn default_embedding_provider() -> String {
    "hashing".into()
}
fn default_embedding_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_fallback_profile() -> String {
    "general-context".into()
}

fn default_profiles() -> Vec<ProfileConfig> {
    vec![
        ProfileConfig {
            name: "general-context".into(),
            model: "all-MiniLM-L6-v2".into(),
            dimensions: 384,
            context_types: vec![ContextType::Tool, ContextType::System],
        },
        ProfileConfig {
            name: "sentiment-context".into(),
            model: "all-mpnet-base-v2".into(),
            dimensions: 768,
            context_types: vec![
                ContextType::Feeling,
                ContextType::Participant,
                ContextType::Emotion,
            ],
        },
        ProfileConfig {
            name: "test-context".into(),
            model: "all-MiniLM-L6-v2".into(),
            dimensions: 384,
            context_types: vec![ContextType::Test],
        },
    ]
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_embedding_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            profiles: default_profiles(),
            fallback_profile: default_fallback_profile(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("profiles", &self.profiles)
            .field("fallback_profile", &self.fallback_profile)
            .finish()
    }
}

/// One embedding space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Identity stored with every vector this profile produces.
    pub name: String,

    /// Upstream model name sent to the embedding endpoint.
    pub model: String,

    pub dimensions: usize,

    #[serde(default)]
    pub context_types: Vec<ContextType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Minimum cosine similarity for a neighbor to be considered.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Number of neighbors fetched per recovery.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Fall back to an exact lookup by context id when no neighbor
    /// carries the context's own id.
    #[serde(default = "default_true")]
    pub keyed_lookup: bool,
}

fn default_score_threshold() -> f32 {
    0.8
}
fn default_candidate_limit() -> usize {
    3
}
fn default_true() -> bool {
    true
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            candidate_limit: default_candidate_limit(),
            keyed_lookup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per external call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

const INDEX_BACKENDS: [&str; 4] = ["memory", "file", "qdrant", "none"];
const EMBEDDING_PROVIDERS: [&str; 2] = ["hashing", "openai"];

impl TofConfig {
    /// Load configuration from the default path (~/.tof/config.toml).
    ///
    /// Environment variables override file values:
    /// - `TOF_INDEX_BACKEND`, `TOF_INDEX_URL`, `TOF_INDEX_API_KEY`
    /// - `TOF_EMBEDDING_PROVIDER`, `TOF_EMBEDDING_API_KEY` (falls back to
    ///   `OPENAI_API_KEY`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("TOF_INDEX_BACKEND") {
            self.index.backend = backend;
        }
        if let Some(url) = lookup("TOF_INDEX_URL") {
            self.index.url = url;
        }
        if let Some(key) = lookup("TOF_INDEX_API_KEY") {
            self.index.api_key = Some(key);
        }
        if let Some(provider) = lookup("TOF_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key =
                lookup("TOF_EMBEDDING_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tof")
    }

    /// Where the "file" index backend stores its points.
    pub fn index_path(&self) -> PathBuf {
        self.index
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("index.jsonl"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !INDEX_BACKENDS.contains(&self.index.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "index.backend must be one of {INDEX_BACKENDS:?}, got '{}'",
                self.index.backend
            )));
        }

        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "embedding.provider must be one of {EMBEDDING_PROVIDERS:?}, got '{}'",
                self.embedding.provider
            )));
        }

        if !(0.0..=1.0).contains(&self.recovery.score_threshold) {
            return Err(ConfigError::ValidationError(
                "recovery.score_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.recovery.candidate_limit == 0 {
            return Err(ConfigError::ValidationError(
                "recovery.candidate_limit must be > 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be >= 1".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::ValidationError(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        if let Some(p) = self.embedding.profiles.iter().find(|p| p.dimensions == 0) {
            return Err(ConfigError::ValidationError(format!(
                "embedding profile '{}' must have dimensions > 0",
                p.name
            )));
        }

        if !self
            .embedding
            .profiles
            .iter()
            .any(|p| p.name == self.embedding.fallback_profile)
        {
            return Err(ConfigError::ValidationError(format!(
                "embedding.fallback_profile '{}' does not name a profile",
                self.embedding.fallback_profile
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `tof init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
