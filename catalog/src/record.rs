//! Endpoint records and build/query results.

use apiscout_embeddings::{Embedding, codec};
use apiscout_openapi::{EndpointDraft, Parameter, ServiceInfo};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A callable endpoint of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Owning service.
    pub service: String,

    /// Path template.
    pub path: String,

    /// Lower-case HTTP method.
    pub method: String,

    /// Operation summary.
    pub summary: String,

    /// Operation description.
    pub description: String,

    /// Accepted parameters.
    pub parameters: Vec<Parameter>,

    /// Text the embedding was computed from.
    pub definition: String,

    /// Embedding of `definition`; endpoints without one are never ranked.
    pub embedding: Option<Embedding>,
}

impl Endpoint {
    /// Attach a draft to a service, without an embedding.
    pub fn from_draft(service: impl Into<String>, draft: EndpointDraft) -> Self {
        Self {
            service: service.into(),
            path: draft.path,
            method: draft.method,
            summary: draft.summary,
            description: draft.description,
            parameters: draft.parameters,
            definition: draft.definition,
            embedding: None,
        }
    }

    /// Set the embedding.
    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether this endpoint takes part in ranking.
    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }

    /// `METHOD /path`, for logs and reports.
    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_ascii_uppercase(), self.path)
    }
}

/// Persisted form of an [`Endpoint`].
///
/// The embedding is kept as little-endian `f32` bytes, written as base64 in
/// text formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub service: String,
    pub path: String,
    pub method: String,
    pub summary: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
    pub definition: String,
    #[serde(default, with = "base64_bytes")]
    pub embedding: Option<Vec<u8>>,
}

impl From<&Endpoint> for EndpointRecord {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            service: endpoint.service.clone(),
            path: endpoint.path.clone(),
            method: endpoint.method.clone(),
            summary: endpoint.summary.clone(),
            description: endpoint.description.clone(),
            parameters: endpoint.parameters.clone(),
            definition: endpoint.definition.clone(),
            embedding: endpoint.embedding.as_deref().map(codec::encode),
        }
    }
}

impl TryFrom<EndpointRecord> for Endpoint {
    type Error = crate::error::CatalogError;

    fn try_from(record: EndpointRecord) -> Result<Self> {
        let embedding = match record.embedding {
            Some(bytes) => Some(codec::decode(&bytes)?),
            None => None,
        };

        Ok(Self {
            service: record.service,
            path: record.path,
            method: record.method,
            summary: record.summary,
            description: record.description,
            parameters: record.parameters,
            definition: record.definition,
            embedding,
        })
    }
}

/// Persisted form of one service catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Service metadata.
    pub info: ServiceInfo,

    /// Model the embeddings were computed with.
    pub model: String,

    /// Length of every stored embedding, if any endpoint has one.
    pub dimension: Option<usize>,

    /// Endpoints in document order.
    pub endpoints: Vec<EndpointRecord>,
}

/// An endpoint that could not be embedded during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingFailure {
    pub path: String,
    pub method: String,
    pub reason: String,
}

/// Outcome of building one service catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Service name.
    pub service: String,

    /// Every extracted endpoint, embedded or not.
    pub endpoints: Vec<Endpoint>,

    /// Endpoints left without an embedding, with the reason.
    pub failures: Vec<EmbeddingFailure>,
}

impl BuildReport {
    /// Endpoints that can be ranked.
    pub fn embedded(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().filter(|e| e.is_embedded())
    }

    /// Whether every endpoint was embedded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of ingesting a document file.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The catalog was (re)built.
    Built(BuildReport),
    /// The service already had a catalog and was left alone.
    Skipped { service: String },
}

/// An endpoint with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEndpoint {
    pub endpoint: Endpoint,
    pub score: f32,
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
