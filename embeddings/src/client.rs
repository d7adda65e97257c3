//! Throttled, retrying embedding client.
//!
//! [`EmbeddingClient`] is what the catalog calls. It turns one text into one
//! vector and owns every policy around the provider call: newline
//! normalisation, the model's token limit, the shared request limiter, the
//! per-request timeout and the retry loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::limiter::RequestLimiter;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::retry::RetryPolicy;
use crate::similarity::is_comparable;
use crate::tokens::{self, TokenCounter};

/// Default token limit of OpenAI embedding models.
pub const DEFAULT_MAX_TOKENS: usize = 8192;

/// Embeds texts through a provider under a fixed set of policies.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    counter: Arc<dyn TokenCounter>,
    limiter: Option<Arc<RequestLimiter>>,
    retry: RetryPolicy,
    model: String,
    dimension: Option<usize>,
    max_tokens: usize,
    timeout: Duration,
}

impl EmbeddingClient {
    /// Create a client for `model` using the given provider and tokenizer.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        counter: Arc<dyn TokenCounter>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            counter,
            limiter: None,
            retry: RetryPolicy::default(),
            model: model.into(),
            dimension: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(90),
        }
    }

    /// Share a request limiter with other clients.
    pub fn with_limiter(mut self, limiter: Arc<RequestLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Require every returned vector to have this dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Set the model's token limit.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the timeout for a single provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model used for every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Token limit enforced before each request.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Tokenizer used for limit checks.
    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Shrink `text` to fit `max_tokens * clip_ratio` tokens of this model.
    pub fn clip(&self, text: &str, clip_ratio: f64) -> Result<String> {
        tokens::clip_to_token_limit(self.counter.as_ref(), text, self.max_tokens, clip_ratio)
    }

    /// Embed one text.
    ///
    /// Fails with [`EmbeddingError::TokenLimitExceeded`] without contacting
    /// the provider when the text is too long, and with
    /// [`EmbeddingError::RetriesExhausted`] once the retry budget is spent.
    /// A vector that is all zeros or holds a non-finite value is an
    /// [`EmbeddingError::InvalidResponse`].
    pub async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let input = tokens::normalize_input(text);
        let token_count = self.counter.count(&input);
        if token_count > self.max_tokens {
            return Err(EmbeddingError::TokenLimitExceeded {
                tokens: token_count,
                max_tokens: self.max_tokens,
                model: self.model.clone(),
            });
        }

        let request = self.request(&input);
        // Cached answers do not spend a limiter permit.
        if let Some(response) = self.provider.cached(&request).await {
            return self.check(&input, response);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&input, request.clone()).await {
                Ok(embedding) => return Ok(embedding),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt, &err);
                    warn!(
                        "Embedding attempt {attempt}/{max_attempts} failed: {err}; retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_retryable() => {
                    return Err(EmbeddingError::RetriesExhausted {
                        attempts: attempt,
                        last_error: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn request(&self, input: &str) -> EmbeddingRequest {
        let request = EmbeddingRequest::new(input).with_model(self.model.clone());
        match self.dimension {
            Some(dimension) => request.with_dimensions(dimension),
            None => request,
        }
    }

    async fn attempt(&self, input: &str, request: EmbeddingRequest) -> Result<Embedding> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| EmbeddingError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;

        self.check(input, response)
    }

    fn check(&self, input: &str, response: EmbeddingResponse) -> Result<Embedding> {
        if let Some(expected) = self.dimension {
            if response.embedding.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: response.embedding.len(),
                });
            }
        }

        if !is_comparable(&response.embedding) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "{} returned a zero or non-finite vector",
                self.provider.name()
            )));
        }

        debug!(
            "Embedded {} chars into {} dimensions via {}",
            input.len(),
            response.embedding.len(),
            self.provider.name()
        );

        Ok(response.embedding)
    }
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
