//! Error types for catalog building and querying.

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while building, storing or querying a catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The API document could not be loaded, resolved or extracted.
    #[error("document error: {0}")]
    Document(#[from] apiscout_openapi::OpenApiError),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] apiscout_embeddings::EmbeddingError),

    /// No catalog has been built for this service.
    #[error("service not found: {service}")]
    ServiceNotFound { service: String },

    /// Query and stored vectors have different lengths.
    #[error("dimension mismatch: catalog has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Two endpoints share the same identity within a service.
    #[error("duplicate endpoint in {service}: {method} {path}")]
    DuplicateEndpoint {
        service: String,
        method: String,
        path: String,
    },

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read a catalog file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write a catalog file.
    #[error("failed to write file: {0}")]
    WriteFile(String),

    /// Failed to delete a catalog file.
    #[error("failed to delete file: {0}")]
    DeleteFile(String),

    /// Service name cannot be used as a file name.
    #[error("invalid service name: {0:?}")]
    InvalidServiceName(String),
}
