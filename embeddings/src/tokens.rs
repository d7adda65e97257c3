//! Token counting and clipping for embedding inputs.

use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::error::{EmbeddingError, Result};

/// Upper bound on clipping rounds before giving up.
pub const MAX_CLIP_ITERATIONS: usize = 16;

/// Counts tokens the way a particular embedding model does.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`, exactly as given.
    fn count(&self, text: &str) -> usize;
}

/// Token counter backed by a tiktoken BPE.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load the tokenizer for `model`.
    ///
    /// Chat models carry their own encoding; embedding models use
    /// `cl100k_base`.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = if model.contains("gpt") {
            tiktoken_rs::get_bpe_from_model(model)
        } else {
            tiktoken_rs::cl100k_base()
        }
        .map_err(|e| EmbeddingError::Tokenizer(format!("{model}: {e}")))?;

        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        // Special-token text is counted as ordinary text.
        self.bpe.encode_ordinary(text).len()
    }
}

/// Replace newlines with spaces before tokenizing or embedding.
pub fn normalize_input(text: &str) -> String {
    text.replace('\n', " ")
}

/// Count tokens of `text` after newline normalisation.
pub fn count_tokens(counter: &dyn TokenCounter, text: &str) -> usize {
    counter.count(&normalize_input(text))
}

/// Shrink `text` until it fits in `max_tokens * clip_ratio` tokens.
///
/// Character count is used as a proxy for token count: each round keeps
/// the same fraction of characters as the limit is of the current token
/// count. Every round removes at least one character, and after
/// [`MAX_CLIP_ITERATIONS`] rounds the clip fails.
pub fn clip_to_token_limit(
    counter: &dyn TokenCounter,
    text: &str,
    max_tokens: usize,
    clip_ratio: f64,
) -> Result<String> {
    let limit = (max_tokens as f64 * clip_ratio).floor() as usize;
    let mut clipped = normalize_input(text);
    let mut tokens = counter.count(&clipped);

    for iteration in 0..MAX_CLIP_ITERATIONS {
        if tokens <= limit {
            return Ok(clipped);
        }

        let chars = clipped.chars().count();
        let keep = ((chars as f64) * (limit as f64) / (tokens as f64)).floor() as usize;
        let keep = keep.min(chars.saturating_sub(1));
        clipped = clipped.chars().take(keep).collect();
        tokens = counter.count(&clipped);
        debug!("Clip round {iteration}: kept {keep} chars, {tokens} tokens (limit {limit})");
    }

    if tokens <= limit {
        return Ok(clipped);
    }

    Err(EmbeddingError::ClipDidNotConverge {
        tokens,
        limit,
        iterations: MAX_CLIP_ITERATIONS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    /// Reports the same count no matter how short the text gets.
    struct StubbornCounter;

    impl TokenCounter for StubbornCounter {
        fn count(&self, _text: &str) -> usize {
            1_000
        }
    }

    #[test]
    fn test_newlines_count_as_spaces() {
        let counter = TiktokenCounter::for_model("text-embedding-3-small").unwrap();
        assert_eq!(
            count_tokens(&counter, "list\nall\nchannels"),
            counter.count("list all channels")
        );
    }

    #[test]
    fn test_tiktoken_counts_nonzero() {
        let counter = TiktokenCounter::for_model("text-embedding-ada-002").unwrap();
        assert!(counter.count("GET /conversations.list") > 0);
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn test_clip_leaves_short_text_alone() {
        let clipped = clip_to_token_limit(&WordCounter, "a b c", 10, 1.0).unwrap();
        assert_eq!(clipped, "a b c");
    }

    #[test]
    fn test_clip_shrinks_until_it_fits() {
        let text = vec!["word"; 400].join(" ");
        let clipped = clip_to_token_limit(&WordCounter, &text, 100, 0.9).unwrap();
        assert!(WordCounter.count(&clipped) <= 90);
        assert!(text.starts_with(&clipped));
    }

    #[test]
    fn test_clip_normalizes_newlines() {
        let clipped = clip_to_token_limit(&WordCounter, "a\nb", 10, 1.0).unwrap();
        assert_eq!(clipped, "a b");
    }

    #[test]
    fn test_clip_gives_up_instead_of_looping() {
        let text = "x".repeat(10_000);
        let result = clip_to_token_limit(&StubbornCounter, &text, 10, 1.0);
        assert!(matches!(
            result,
            Err(EmbeddingError::ClipDidNotConverge { .. })
        ));
    }
}
