//! Error types for document loading and resolution.

use thiserror::Error;

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, OpenApiError>;

/// Errors that can occur while loading or walking an API document.
#[derive(Error, Debug)]
pub enum OpenApiError {
    /// A reference leads back to itself.
    #[error("circular reference detected: {reference}")]
    CircularReference { reference: String },

    /// A reference points at nothing in the document.
    #[error("unresolvable reference: {reference}")]
    UnresolvableReference { reference: String },

    /// File type not recognised.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Document structure is not what an API description needs.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
