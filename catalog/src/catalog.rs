//! The endpoint catalog of one service.

use std::collections::HashSet;

use apiscout_embeddings::rank;
use apiscout_openapi::ServiceInfo;

use crate::error::{CatalogError, Result};
use crate::record::{Endpoint, EndpointRecord, RankedEndpoint, ServiceRecord};

/// Endpoints of one service together with their embeddings.
///
/// Endpoint identity is (service, path, method) and is unique within a
/// catalog. Every embedding in a catalog has the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointCatalog {
    info: ServiceInfo,
    model: String,
    dimension: Option<usize>,
    endpoints: Vec<Endpoint>,
}

impl EndpointCatalog {
    /// Assemble a catalog, checking identities and embedding lengths.
    pub fn new(
        info: ServiceInfo,
        model: impl Into<String>,
        endpoints: Vec<Endpoint>,
    ) -> Result<Self> {
        let mut seen = HashSet::with_capacity(endpoints.len());
        let mut dimension = None;

        for endpoint in &endpoints {
            if !seen.insert((endpoint.path.as_str(), endpoint.method.as_str())) {
                return Err(CatalogError::DuplicateEndpoint {
                    service: info.name.clone(),
                    method: endpoint.method.clone(),
                    path: endpoint.path.clone(),
                });
            }

            if let Some(embedding) = &endpoint.embedding {
                match dimension {
                    None => dimension = Some(embedding.len()),
                    Some(expected) if expected != embedding.len() => {
                        return Err(CatalogError::DimensionMismatch {
                            expected,
                            actual: embedding.len(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self {
            info,
            model: model.into(),
            dimension,
            endpoints,
        })
    }

    /// Service name.
    pub fn service(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// Model the embeddings were computed with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embedding length, `None` when nothing is embedded.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Find an endpoint by path and method.
    pub fn get(&self, path: &str, method: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.path == path && e.method.eq_ignore_ascii_case(method))
    }

    /// Rank embedded endpoints against `query`, best first.
    ///
    /// Endpoints without an embedding are skipped. A query whose length
    /// differs from the stored embeddings is an error.
    pub fn rank(&self, query: &[f32], top_k: Option<usize>) -> Result<Vec<RankedEndpoint>> {
        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(CatalogError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let entries = self
            .endpoints
            .iter()
            .filter_map(|endpoint| endpoint.embedding.as_ref().map(|e| (endpoint, e)));

        Ok(rank(query, entries, top_k)?
            .into_iter()
            .map(|(endpoint, score)| RankedEndpoint {
                endpoint: endpoint.clone(),
                score,
            })
            .collect())
    }

    /// Convert to the persisted form.
    pub fn to_record(&self) -> ServiceRecord {
        ServiceRecord {
            info: self.info.clone(),
            model: self.model.clone(),
            dimension: self.dimension,
            endpoints: self.endpoints.iter().map(EndpointRecord::from).collect(),
        }
    }

    /// Rebuild from the persisted form.
    pub fn from_record(record: ServiceRecord) -> Result<Self> {
        let endpoints = record
            .endpoints
            .into_iter()
            .map(Endpoint::try_from)
            .collect::<Result<Vec<_>>>()?;
        let catalog = Self::new(record.info, record.model, endpoints)?;

        if let (Some(expected), Some(actual)) = (record.dimension, catalog.dimension) {
            if expected != actual {
                return Err(CatalogError::DimensionMismatch { expected, actual });
            }
        }
        Ok(catalog)
    }
}
