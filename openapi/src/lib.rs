//! # OpenAPI
//!
//! Loads API description documents (JSON or YAML), inlines internal
//! `$ref` pointers and turns every path/method pair into an endpoint draft
//! ready for embedding.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OpenAPI Ingestion                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  file ──► ApiDocument ──► EndpointExtractor ──► EndpointDraft   │
//! │                │                 │                              │
//! │                ▼                 ▼                              │
//! │           ServiceInfo      SchemaResolver                       │
//! │                            (full / schema-only)                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod document;
pub mod error;
pub mod extractor;
pub mod resolver;

pub use document::{ApiDocument, Format, ServiceInfo};
pub use error::{OpenApiError, Result};
pub use extractor::{EndpointDraft, EndpointExtractor, Parameter};
pub use resolver::{ResolveMode, SchemaResolver};
