//! Catalog build and query engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use apiscout_embeddings::{
    CachedProvider, Embedding, EmbeddingCache, EmbeddingClient, EmbeddingProvider,
    OpenAIProvider, RequestLimiter, TiktokenCounter, TokenCounter,
};
use apiscout_openapi::{ApiDocument, EndpointExtractor, Format, ServiceInfo};
use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, warn};

use crate::catalog::EndpointCatalog;
use crate::config::{CatalogConfig, FailurePolicy};
use crate::error::{CatalogError, Result, StorageError};
use crate::record::{BuildReport, EmbeddingFailure, Endpoint, IngestOutcome, RankedEndpoint};
use crate::store::{CatalogStore, MemoryCatalogStore};

/// Builds service catalogs from API documents and answers prompt queries.
///
/// Builds and queries go through the same [`EmbeddingClient`], so both use
/// one model and share one request limiter.
pub struct ApiCatalog {
    config: CatalogConfig,
    client: EmbeddingClient,
    store: Arc<dyn CatalogStore>,
}

impl ApiCatalog {
    /// Create a new engine builder.
    pub fn builder() -> ApiCatalogBuilder {
        ApiCatalogBuilder::new()
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn client(&self) -> &EmbeddingClient {
        &self.client
    }

    /// Extract, embed and store every endpoint of `document` as `service`.
    ///
    /// Document errors abort the build before anything is stored. Endpoints
    /// that cannot be embedded are kept without a vector and listed in the
    /// report, unless the failure policy is [`FailurePolicy::Abort`].
    pub async fn build_catalog(
        &self,
        service: &str,
        document: &ApiDocument,
    ) -> Result<BuildReport> {
        let info = document.service_info(service);
        let drafts = EndpointExtractor::new(document).extract()?;
        info!("Building catalog {service} from {} endpoints", drafts.len());

        let concurrency = self.config.embedding.max_concurrent_requests.max(1);
        let mut embedded = stream::iter(drafts)
            .map(|draft| async move {
                let embedding = self.embed_definition(&draft.definition).await;
                (draft, embedding)
            })
            .buffered(concurrency);

        let mut endpoints = Vec::new();
        let mut failures = Vec::new();
        while let Some((draft, embedding)) = embedded.next().await {
            let endpoint = Endpoint::from_draft(service, draft);
            match embedding {
                Ok(vector) => endpoints.push(endpoint.with_embedding(vector)),
                Err(err) if self.config.failure_policy == FailurePolicy::Abort => {
                    warn!("Aborting build of {service} at {}: {err}", endpoint.label());
                    return Err(err.into());
                }
                Err(err) => {
                    warn!("No embedding for {} in {service}: {err}", endpoint.label());
                    failures.push(EmbeddingFailure {
                        path: endpoint.path.clone(),
                        method: endpoint.method.clone(),
                        reason: err.to_string(),
                    });
                    endpoints.push(endpoint);
                }
            }
        }

        let catalog = EndpointCatalog::new(info, self.client.model(), endpoints)?;
        let report = BuildReport {
            service: service.to_string(),
            endpoints: catalog.endpoints().to_vec(),
            failures,
        };
        self.store.replace_service(catalog).await?;

        info!(
            "Built catalog {service}: {} embedded, {} failed",
            report.embedded().count(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Build a catalog from a document file.
    ///
    /// The service is named after the file name up to its first dot. A
    /// service that already has a catalog is skipped unless `recreate` is
    /// set.
    pub async fn ingest_file(
        &self,
        path: impl AsRef<Path>,
        recreate: bool,
    ) -> Result<IngestOutcome> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let service = service_name(path)?;

        if self.store.contains_service(&service).await? {
            if !recreate {
                info!("Service {service} already exists, skipping");
                return Ok(IngestOutcome::Skipped { service });
            }
            info!("Service {service} already exists, recreating");
        }

        let text = tokio::fs::read_to_string(path).await?;
        let document = ApiDocument::parse_as(&text, format)?;
        Ok(IngestOutcome::Built(
            self.build_catalog(&service, &document).await?,
        ))
    }

    /// Ingest every `.json`, `.yaml` and `.yml` file of `dir`, in name order.
    pub async fn ingest_dir(
        &self,
        dir: impl AsRef<Path>,
        recreate: bool,
    ) -> Result<Vec<IngestOutcome>> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && Format::from_path(&path).is_ok() {
                files.push(path);
            }
        }
        files.sort();

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            outcomes.push(self.ingest_file(&file, recreate).await?);
        }
        Ok(outcomes)
    }

    /// Rank the endpoints of `service` against `prompt`, best first.
    ///
    /// `top_k = None` returns every embedded endpoint.
    pub async fn query(
        &self,
        service: &str,
        prompt: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RankedEndpoint>> {
        let catalog = self.load(service).await?;
        if catalog.model() != self.client.model() {
            warn!(
                "Catalog {service} was built with {}, querying with {}",
                catalog.model(),
                self.client.model()
            );
        }

        let vector = self.client.embed_text(prompt).await?;
        let ranked = catalog.rank(&vector, top_k)?;
        debug!("Query on {service} matched {} endpoints", ranked.len());
        Ok(ranked)
    }

    /// [`Self::query`] with the configured default result count.
    pub async fn query_default(&self, service: &str, prompt: &str) -> Result<Vec<RankedEndpoint>> {
        self.query(service, prompt, Some(self.config.query.default_top_k)).await
    }

    /// The single best endpoint of `service` for `prompt`.
    pub async fn query_best(&self, service: &str, prompt: &str) -> Result<Option<RankedEndpoint>> {
        Ok(self.query(service, prompt, Some(1)).await?.into_iter().next())
    }

    /// Names of all catalogued services.
    pub async fn list_services(&self) -> Result<Vec<String>> {
        self.store.list_services().await
    }

    /// Metadata of a catalogued service.
    pub async fn service_info(&self, service: &str) -> Result<ServiceInfo> {
        Ok(self.load(service).await?.info().clone())
    }

    /// Endpoints of a catalogued service in document order.
    pub async fn endpoints(&self, service: &str) -> Result<Vec<Endpoint>> {
        Ok(self.load(service).await?.endpoints().to_vec())
    }

    /// Delete a service catalog. Returns whether it existed.
    pub async fn remove_service(&self, service: &str) -> Result<bool> {
        self.store.remove_service(service).await
    }

    async fn load(&self, service: &str) -> Result<EndpointCatalog> {
        self.store
            .load_service(service)
            .await?
            .ok_or_else(|| CatalogError::ServiceNotFound {
                service: service.to_string(),
            })
    }

    async fn embed_definition(&self, definition: &str) -> apiscout_embeddings::Result<Embedding> {
        let config = &self.config.embedding;
        if config.clip_oversized {
            let clipped = self.client.clip(definition, config.clip_ratio)?;
            return self.client.embed_text(&clipped).await;
        }
        self.client.embed_text(definition).await
    }
}

impl std::fmt::Debug for ApiCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCatalog")
            .field("config", &self.config)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

fn service_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            CatalogError::Config(format!(
                "cannot derive a service name from {}",
                path.display()
            ))
        })
}

/// Builder for [`ApiCatalog`].
pub struct ApiCatalogBuilder {
    config: CatalogConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    counter: Option<Arc<dyn TokenCounter>>,
    store: Option<Arc<dyn CatalogStore>>,
    limiter: Option<Arc<RequestLimiter>>,
}

impl ApiCatalogBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: CatalogConfig::default(),
            provider: None,
            counter: None,
            store: None,
            limiter: None,
        }
    }

    pub fn with_config(mut self, config: CatalogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the embedding provider. Defaults to [`OpenAIProvider`].
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tokenizer. Defaults to the model's tiktoken encoding.
    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Set the catalog store. Defaults to [`MemoryCatalogStore`].
    pub fn with_store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a request limiter with other engines.
    pub fn with_limiter(mut self, limiter: Arc<RequestLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the engine.
    ///
    /// With caching enabled the provider is wrapped in a [`CachedProvider`],
    /// loading the persisted cache file when one is configured.
    pub async fn build(self) -> Result<ApiCatalog> {
        self.config.validate()?;
        let embedding = &self.config.embedding;
        let cache = &self.config.cache;

        let mut provider: Arc<dyn EmbeddingProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(OpenAIProvider::new().with_model(embedding.model.clone())),
        };
        if cache.enabled {
            let store = match &cache.path {
                Some(path) => EmbeddingCache::with_persistence(path, cache.max_entries).await?,
                None => EmbeddingCache::new(cache.max_entries),
            };
            provider = Arc::new(CachedProvider::new(provider, store));
        }
        let counter: Arc<dyn TokenCounter> = match self.counter {
            Some(counter) => counter,
            None => Arc::new(TiktokenCounter::for_model(&embedding.model)?),
        };
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RequestLimiter::per_minute(embedding.requests_per_minute)));

        let mut client = EmbeddingClient::new(provider, counter, embedding.model.clone())
            .with_limiter(limiter)
            .with_retry(embedding.retry.to_policy())
            .with_max_tokens(embedding.max_tokens)
            .with_timeout(embedding.request_timeout());
        if let Some(dimension) = embedding.dimension {
            client = client.with_dimension(dimension);
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCatalogStore::new()));

        debug!("Catalog engine ready: {client:?}");
        Ok(ApiCatalog {
            config: self.config,
            client,
            store,
        })
    }
}

impl Default for ApiCatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
