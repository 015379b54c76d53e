use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::HarnessError;

/// Token-counting collaborator used for both prompt and completion counts.
///
/// Failures here are not recovered by the predictor; they propagate to the
/// caller as [`HarnessError::Tokenizer`].
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize, HarnessError>;
}

/// Counter backed by a Hugging Face `tokenizer.json` file.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| HarnessError::Tokenizer(e.to_string()))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, HarnessError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| HarnessError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().len())
    }
}

/// Whitespace-split fallback for runs without a tokenizer file. Counts are
/// approximate but deterministic.
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, HarnessError> {
        Ok(text.split_whitespace().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_counter_splits_on_whitespace() {
        let counter = HeuristicCounter;
        assert_eq!(counter.count_tokens("the quick brown fox").unwrap(), 4);
        assert_eq!(counter.count_tokens("").unwrap(), 0);
        assert_eq!(counter.count_tokens("  spaced   out  ").unwrap(), 2);
    }
}
