//! Embedding cache so rebuilding an unchanged catalog does not call the
//! provider again.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::is_comparable;

/// Cache entry for an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// SHA-256 of model and text.
    pub key: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Insertion sequence number, used for eviction.
    pub sequence: u64,
}

/// Cache for embeddings to avoid redundant API calls.
pub struct EmbeddingCache {
    /// In-memory cache.
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Path for persistent cache storage.
    cache_path: Option<PathBuf>,

    /// Maximum cache size.
    max_entries: usize,

    next_sequence: AtomicU64,

    /// Serializes writes of the cache file.
    save_lock: Mutex<()>,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_path: None,
            max_entries: max_entries.max(1),
            next_sequence: AtomicU64::new(0),
            save_lock: Mutex::new(()),
        }
    }

    /// Create a cache with persistent storage.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let mut cache = Self::new(max_entries);
        cache.cache_path = Some(path.as_ref().to_path_buf());
        cache.load().await?;
        Ok(cache)
    }

    /// Compute the lookup key for a text under a model.
    pub fn hash_key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let cache = self.cache.read().await;
        cache.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) -> Result<()> {
        let key = Self::hash_key(text, model);
        let entry = CacheEntry {
            key: key.clone(),
            embedding,
            model: model.to_string(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
        };

        {
            let mut cache = self.cache.write().await;

            if !cache.contains_key(&key) && cache.len() >= self.max_entries {
                if let Some(oldest_key) = cache
                    .iter()
                    .min_by_key(|(_, v)| v.sequence)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest_key);
                }
            }

            cache.insert(key, entry);
            debug!("Cached embedding for text (model: {model})");
        }

        if self.cache_path.is_some() {
            self.save().await?;
        }

        Ok(())
    }

    /// Check if an embedding is cached.
    pub async fn contains(&self, text: &str, model: &str) -> bool {
        let key = Self::hash_key(text, model);
        self.cache.read().await.contains_key(&key)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let mut models: Vec<String> = cache
            .values()
            .map(|e| e.model.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        models.sort();

        CacheStats {
            entries: cache.len(),
            max_entries: self.max_entries,
            models,
        }
    }

    /// Save cache to disk.
    async fn save(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock().await;
        let content = {
            let cache = self.cache.read().await;
            let mut entries: Vec<&CacheEntry> = cache.values().collect();
            entries.sort_by_key(|e| e.sequence);
            serde_json::to_string(&entries)?
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;
        debug!("Saved embedding cache to {}", path.display());
        Ok(())
    }

    /// Load cache from disk.
    async fn load(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        if !fs::try_exists(path).await? {
            return Ok(());
        }

        let content = fs::read_to_string(path).await?;
        let entries: Vec<CacheEntry> = serde_json::from_str(&content)
            .map_err(|e| EmbeddingError::Cache(format!("{}: {e}", path.display())))?;

        let mut cache = self.cache.write().await;
        let mut next = 0;
        for entry in entries {
            next = next.max(entry.sequence + 1);
            cache.insert(entry.key.clone(), entry);
        }
        self.next_sequence.store(next, Ordering::SeqCst);

        info!("Loaded {} cache entries from disk", cache.len());
        Ok(())
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Models with cached embeddings.
    pub models: Vec<String>,
}

/// A provider that answers repeated requests from an [`EmbeddingCache`].
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    fn model_of(&self, request: &EmbeddingRequest) -> String {
        request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        if let Some(response) = self.cached(&request).await {
            return Ok(response);
        }

        let model = self.model_of(&request);
        let text = request.text.clone();
        let response = self.provider.embed(request).await?;
        if !is_comparable(&response.embedding) {
            debug!("Not caching a degenerate embedding");
            return Ok(response);
        }
        if let Err(e) = self
            .cache
            .put(&text, &model, response.embedding.clone())
            .await
        {
            warn!("Failed to cache embedding: {e}");
        }

        Ok(response)
    }

    async fn cached(&self, request: &EmbeddingRequest) -> Option<EmbeddingResponse> {
        let model = self.model_of(request);
        let embedding = self.cache.get(&request.text, &model).await?;
        debug!("Cache hit for embedding");
        Some(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model,
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
