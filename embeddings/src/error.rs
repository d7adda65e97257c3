//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request rejected by the provider.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Provider-side failure (5xx).
    #[error("provider error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The provider did not answer within the request timeout.
    #[error("embedding request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Every retry attempt failed.
    #[error("embedding failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<EmbeddingError>,
    },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Cosine similarity is undefined for a zero vector.
    #[error("cannot compare a zero-magnitude vector")]
    ZeroMagnitude,

    /// Text too long for the embedding model.
    #[error("tokens exceed maximum length ({tokens} > {max_tokens}) for model {model}")]
    TokenLimitExceeded {
        tokens: usize,
        max_tokens: usize,
        model: String,
    },

    /// Clipping could not bring the text under the limit.
    #[error("text still has {tokens} tokens after {iterations} clipping rounds (limit {limit})")]
    ClipDidNotConverge {
        tokens: usize,
        limit: usize,
        iterations: usize,
    },

    /// Tokenizer could not be loaded for a model.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Stored vector bytes are malformed.
    #[error("invalid vector encoding: {0}")]
    InvalidEncoding(String),

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::ServerError { .. } | Self::Timeout { .. } => true,
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EmbeddingError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(
            EmbeddingError::ServerError {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(EmbeddingError::Timeout { timeout_secs: 30 }.is_retryable());
        assert!(!EmbeddingError::ApiRequest("bad request".to_string()).is_retryable());
        assert!(
            !EmbeddingError::TokenLimitExceeded {
                tokens: 10,
                max_tokens: 5,
                model: "m".to_string()
            }
            .is_retryable()
        );
    }
}
