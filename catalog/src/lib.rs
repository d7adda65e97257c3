//! # Catalog
//!
//! Builds a searchable catalog of callable endpoints from API description
//! documents and matches free-text prompts to the most relevant endpoints.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         ApiCatalog                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  build:  ApiDocument ──► EndpointExtractor ──► EmbeddingClient  │
//! │                                   │                 │           │
//! │                                   ▼                 ▼           │
//! │                            EndpointCatalog ◄── embeddings       │
//! │                                   │                             │
//! │                                   ▼                             │
//! │                            CatalogStore (memory / JSON)         │
//! │                                                                 │
//! │  query:  prompt ──► EmbeddingClient ──► EndpointCatalog::rank   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use apiscout_catalog::ApiCatalog;
//!
//! let catalog = ApiCatalog::builder().build().await?;
//! catalog.ingest_file("definitions/slack.json", false).await?;
//!
//! for hit in catalog.query("slack", "post a message to a channel", Some(5)).await? {
//!     println!("{:.3} {}", hit.score, hit.endpoint.label());
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod store;

pub use catalog::EndpointCatalog;
pub use config::{
    CacheConfig, CatalogConfig, EmbeddingConfig, FailurePolicy, QueryConfig, RetryConfig,
};
pub use engine::{ApiCatalog, ApiCatalogBuilder};
pub use error::{CatalogError, Result, StorageError};
pub use record::{
    BuildReport, EmbeddingFailure, Endpoint, EndpointRecord, IngestOutcome, RankedEndpoint,
    ServiceRecord,
};
pub use store::{CatalogStore, JsonCatalogStore, MemoryCatalogStore};
