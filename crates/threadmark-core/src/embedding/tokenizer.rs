//! Tokenization for the embedding paths.
//!
//! Wraps a HuggingFace tokenizer configured for one encoding path: right
//! truncation and fixed right padding to the path's maximum length. The
//! encoder consumes the padded sequence; the adapter strips padding rows
//! afterwards using the attention mask.

use crate::error::EmbeddingError;
use tokenizers::tokenizer::{
    PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer, TruncationDirection,
    TruncationParams, TruncationStrategy,
};

/// Token used for padding; id 0 in BERT-style vocabularies.
const PAD_TOKEN: &str = "[PAD]";

/// Handle for a tokenizer configured with truncation and padding.
pub struct TokenizerHandle {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl TokenizerHandle {
    /// Creates a handle from serialized tokenizer JSON bytes.
    pub fn from_bytes(tokenizer_bytes: &[u8], max_length: usize) -> Result<Self, EmbeddingError> {
        let tokenizer = Tokenizer::from_bytes(tokenizer_bytes).map_err(|e| {
            EmbeddingError::TokenizerUnavailable(format!("Failed to deserialize tokenizer: {}", e))
        })?;
        Self::from_tokenizer(tokenizer, max_length)
    }

    /// Creates a handle from an already-built tokenizer.
    pub fn from_tokenizer(
        mut tokenizer: Tokenizer,
        max_length: usize,
    ) -> Result<Self, EmbeddingError> {
        let pad_id = tokenizer.token_to_id(PAD_TOKEN).unwrap_or(0);

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                stride: 0,
                strategy: TruncationStrategy::OnlyFirst,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| {
                EmbeddingError::InvalidConfig(format!("Failed to configure truncation: {}", e))
            })?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_length),
            direction: PaddingDirection::Right,
            pad_to_multiple_of: None,
            pad_id,
            pad_type_id: 0,
            pad_token: PAD_TOKEN.to_string(),
        }));

        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    /// Encodes text into a padded, truncated encoding.
    ///
    /// The returned encoding carries ids, attention mask, and token strings,
    /// all of length `max_length`.
    pub fn encode(&self, text: &str) -> Result<tokenizers::Encoding, EmbeddingError> {
        self.tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::TokenizationFailed(format!("Encoding failed: {}", e)))
    }

    /// Returns the configured maximum length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Returns the id of a token, if present in the vocabulary.
    pub fn token_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    /// Returns the vocabulary size including added tokens.
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// Returns a reference to the underlying tokenizer.
    pub fn inner(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl Clone for TokenizerHandle {
    fn clone(&self) -> Self {
        Self {
            tokenizer: self.tokenizer.clone(),
            max_length: self.max_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::word_tokenizer;

    #[test]
    fn test_encode_pads_to_max_length() {
        let handle =
            TokenizerHandle::from_tokenizer(word_tokenizer(&["hello", "world"]), 8).unwrap();
        let encoding = handle.encode("hello world").unwrap();

        assert_eq!(encoding.get_ids().len(), 8);
        assert_eq!(encoding.get_attention_mask().len(), 8);
        let valid: usize = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as usize)
            .sum();
        assert_eq!(valid, 2);
    }

    #[test]
    fn test_encode_truncates_to_max_length() {
        let handle = TokenizerHandle::from_tokenizer(word_tokenizer(&["word"]), 4).unwrap();
        let encoding = handle.encode(&"word ".repeat(20)).unwrap();
        assert_eq!(encoding.get_ids().len(), 4);
    }

    #[test]
    fn test_token_id_lookup() {
        let handle = TokenizerHandle::from_tokenizer(word_tokenizer(&["cat"]), 4).unwrap();
        assert!(handle.token_id("cat").is_some());
        assert!(handle.token_id("unseen-token").is_none());
    }
}
