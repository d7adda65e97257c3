//! Configuration for catalog building and querying.

use std::path::{Path, PathBuf};
use std::time::Duration;

use apiscout_embeddings::RetryPolicy;
use apiscout_embeddings::client::DEFAULT_MAX_TOKENS;
use apiscout_embeddings::provider::DEFAULT_MODEL;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Configuration for the catalog engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Embedding settings shared by builds and queries.
    pub embedding: EmbeddingConfig,

    /// Embedding cache settings.
    pub cache: CacheConfig,

    /// Query settings.
    pub query: QueryConfig,

    /// What a build does when an endpoint cannot be embedded.
    pub failure_policy: FailurePolicy,
}

impl CatalogConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| CatalogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the cache configuration.
    pub fn with_cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Set the query configuration.
    pub fn with_query(mut self, config: QueryConfig) -> Self {
        self.query = config;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Reject values no build could run with.
    pub fn validate(&self) -> Result<()> {
        let embedding = &self.embedding;
        if embedding.model.trim().is_empty() {
            return Err(CatalogError::Config("embedding.model is empty".to_string()));
        }
        if !(embedding.clip_ratio > 0.0 && embedding.clip_ratio <= 1.0) {
            return Err(CatalogError::Config(format!(
                "embedding.clip_ratio must be in (0, 1], got {}",
                embedding.clip_ratio
            )));
        }
        if embedding.max_concurrent_requests == 0 {
            return Err(CatalogError::Config(
                "embedding.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(CatalogError::Config(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if embedding.dimension == Some(0) {
            return Err(CatalogError::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if embedding.request_timeout_secs == 0 {
            return Err(CatalogError::Config(
                "embedding.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        embedding.retry.validate()
    }
}

/// Configuration for the embedding client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model used for both endpoint definitions and prompts.
    pub model: String,

    /// Expected vector length; `None` accepts whatever the model returns.
    pub dimension: Option<usize>,

    /// Token limit of the model.
    pub max_tokens: usize,

    /// Fraction of `max_tokens` that clipped text is shrunk to.
    pub clip_ratio: f64,

    /// Clip oversized definitions instead of failing them.
    pub clip_oversized: bool,

    /// Shared request budget per minute.
    pub requests_per_minute: u32,

    /// Embedding calls in flight during a build.
    pub max_concurrent_requests: usize,

    /// Timeout of a single provider call, in seconds.
    pub request_timeout_secs: u64,

    /// Retry behaviour for transient failures.
    pub retry: RetryConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            dimension: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            clip_ratio: 0.9,
            clip_oversized: true,
            requests_per_minute: 60,
            max_concurrent_requests: 4,
            request_timeout_secs: 90,
            retry: RetryConfig::default(),
        }
    }
}

impl EmbeddingConfig {
    /// Timeout of a single provider call.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Longest accepted retry delay: one day.
const MAX_DELAY_SECS: f64 = 86_400.0;

/// Retry settings, with delays in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay_secs: f64,

    /// Growth factor between retries.
    pub multiplier: f64,

    /// Upper bound of the random extra delay.
    pub max_jitter_secs: f64,

    /// Cap on any single delay.
    pub max_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_secs: policy.initial_delay.as_secs_f64(),
            multiplier: policy.multiplier,
            max_jitter_secs: policy.max_jitter.as_secs_f64(),
            max_delay_secs: policy.max_delay.as_secs_f64(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("initial_delay_secs", self.initial_delay_secs),
            ("max_jitter_secs", self.max_jitter_secs),
            ("max_delay_secs", self.max_delay_secs),
        ] {
            if !(0.0..=MAX_DELAY_SECS).contains(&value) {
                return Err(CatalogError::Config(format!(
                    "embedding.retry.{name} must be between 0 and {MAX_DELAY_SECS}, got {value}"
                )));
            }
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(CatalogError::Config(format!(
                "embedding.retry.multiplier must be a finite value of at least 1, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Build the policy the embedding client runs with.
    ///
    /// Values out of range are clamped.
    pub fn to_policy(&self) -> RetryPolicy {
        let secs = |value: f64| {
            Duration::try_from_secs_f64(value.clamp(0.0, MAX_DELAY_SECS)).unwrap_or_default()
        };
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: secs(self.initial_delay_secs),
            multiplier: self.multiplier.max(1.0),
            max_jitter: secs(self.max_jitter_secs),
            max_delay: secs(self.max_delay_secs),
        }
    }
}

/// Configuration for the embedding cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether to cache embeddings.
    pub enabled: bool,

    /// Maximum cache size.
    pub max_entries: usize,

    /// File the cache is persisted to; in memory only when unset.
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            path: None,
        }
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Result count used by `ApiCatalog::query_default`.
    pub default_top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_top_k: 40 }
    }
}

/// What a build does with an endpoint whose embedding failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the endpoint without an embedding and report the failure.
    #[default]
    Degrade,
    /// Fail the whole build on the first embedding failure.
    Abort,
}
