//! # Embeddings
//!
//! This crate turns endpoint definitions and free-text prompts into dense
//! vectors and ranks stored vectors against a query.
//!
//! ## Features
//!
//! - **Embedding Generation**: `EmbeddingProvider` trait with an
//!   OpenAI-compatible HTTP implementation
//! - **Request Policies**: token limits, clipping, shared rate limiting,
//!   timeouts and retries in `EmbeddingClient`
//! - **Ranking**: cosine similarity with stable top-k ordering
//! - **Storage Codec**: exact byte encoding of vectors
//! - **Caching**: reuse of previously computed embeddings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  TokenCounter ──► EmbeddingClient ──► EmbeddingProvider         │
//! │                    │        │               │                   │
//! │                    ▼        ▼               ▼                   │
//! │          RequestLimiter  RetryPolicy   CachedProvider           │
//! │                                                                 │
//! │  Embedding ──► codec (bytes)      Embedding ──► rank            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod client;
pub mod codec;
pub mod error;
pub mod limiter;
pub mod provider;
pub mod retry;
pub mod similarity;
pub mod tokens;

pub use cache::{CachedProvider, EmbeddingCache};
pub use client::EmbeddingClient;
pub use error::{EmbeddingError, Result};
pub use limiter::RequestLimiter;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use retry::RetryPolicy;
pub use similarity::{cosine_similarity, is_comparable, rank};
pub use tokens::{TiktokenCounter, TokenCounter};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small
