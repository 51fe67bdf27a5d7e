//! Embedding adapter: text in, padding-free token embeddings out.

use super::tokenizer::TokenizerHandle;
use super::traits::TokenEncoder;
use crate::error::EmbeddingError;
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Token-level embedding of one text span.
///
/// `vectors` and `tokens` have matching, padding-free length: row `i` is the
/// embedding of `tokens[i]`.
#[derive(Debug, Clone)]
pub struct ChunkEmbedding {
    /// One L2-normalized vector per valid token
    pub vectors: Vec<Vec<f32>>,
    /// Token strings aligned with `vectors`
    pub tokens: Vec<String>,
}

impl ChunkEmbedding {
    /// Number of valid tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if the span produced no valid tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Wraps a [`TokenEncoder`] with tokenization and padding removal.
///
/// The adapter tokenizes with truncation and fixed padding to the configured
/// path maximum, runs the matching encoder path (queries and documents may
/// use different learned projections), then strips padding rows so the
/// returned matrix and token list are aligned and padding-free.
pub struct EmbeddingAdapter {
    encoder: Arc<dyn TokenEncoder>,
    query_tokenizer: TokenizerHandle,
    doc_tokenizer: TokenizerHandle,
}

impl EmbeddingAdapter {
    /// Creates an adapter from an encoder and a shared tokenizer.
    ///
    /// # Arguments
    ///
    /// * `encoder` - The token-level encoder implementation
    /// * `tokenizer` - Tokenizer shared by both paths
    /// * `query_maxlen` - Token budget for the query path
    /// * `doc_maxlen` - Token budget for the document path
    pub fn new(
        encoder: Arc<dyn TokenEncoder>,
        tokenizer: Tokenizer,
        query_maxlen: usize,
        doc_maxlen: usize,
    ) -> Result<Self, EmbeddingError> {
        let query_tokenizer = TokenizerHandle::from_tokenizer(tokenizer.clone(), query_maxlen)?;
        let doc_tokenizer = TokenizerHandle::from_tokenizer(tokenizer, doc_maxlen)?;
        Ok(Self {
            encoder,
            query_tokenizer,
            doc_tokenizer,
        })
    }

    /// Embedding dimension of the wrapped encoder.
    pub fn embedding_dim(&self) -> usize {
        self.encoder.embedding_dim()
    }

    /// Embeds a text span at the token level.
    ///
    /// Uses the query projection when `is_query` is true, the document
    /// projection otherwise. The returned embedding is padding-free: its
    /// matrix and token list have matching length, one row per valid token.
    pub fn embed(&self, text: &str, is_query: bool) -> Result<ChunkEmbedding, EmbeddingError> {
        let handle = if is_query {
            &self.query_tokenizer
        } else {
            &self.doc_tokenizer
        };

        let encoding = handle.encode(text)?;
        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        let token_strings = encoding.get_tokens();

        let rows = if is_query {
            self.encoder.encode_query(ids, mask)?
        } else {
            self.encoder.encode_doc(ids, mask)?
        };

        if rows.len() != ids.len() {
            return Err(EmbeddingError::InferenceFailed(format!(
                "Encoder returned {} rows for {} tokens",
                rows.len(),
                ids.len()
            )));
        }

        let mut vectors = Vec::new();
        let mut tokens = Vec::new();
        for ((row, token), &m) in rows.into_iter().zip(token_strings.iter()).zip(mask.iter()) {
            if m != 0 {
                vectors.push(row);
                tokens.push(token.clone());
            }
        }

        Ok(ChunkEmbedding { vectors, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_adapter, word_tokenizer, HashTokenEncoder};

    #[test]
    fn test_embed_strips_padding() {
        let adapter = test_adapter(&["the", "cat", "sat"]);
        let embedding = adapter.embed("the cat sat", false).unwrap();

        assert_eq!(embedding.len(), 3);
        assert_eq!(embedding.vectors.len(), embedding.tokens.len());
        assert_eq!(embedding.tokens, vec!["the", "cat", "sat"]);
    }

    #[test]
    fn test_embed_rows_are_unit_vectors() {
        let adapter = test_adapter(&["alpha", "beta"]);
        let embedding = adapter.embed("alpha beta", true).unwrap();

        for row in &embedding.vectors {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "row norm {}", norm);
        }
    }

    #[test]
    fn test_query_and_doc_paths_agree_on_dimension() {
        let adapter = test_adapter(&["token"]);
        let q = adapter.embed("token", true).unwrap();
        let d = adapter.embed("token", false).unwrap();
        assert_eq!(q.vectors[0].len(), adapter.embedding_dim());
        assert_eq!(d.vectors[0].len(), adapter.embedding_dim());
    }

    #[test]
    fn test_same_token_embeds_identically() {
        let adapter = test_adapter(&["cat", "dog"]);
        let a = adapter.embed("cat", false).unwrap();
        let b = adapter.embed("dog cat", false).unwrap();
        assert_eq!(a.vectors[0], b.vectors[1]);
    }

    #[test]
    fn test_truncation_bounds_token_count() {
        let encoder = Arc::new(HashTokenEncoder::new(16));
        let adapter =
            EmbeddingAdapter::new(encoder, word_tokenizer(&["word"]), 4, 8).unwrap();

        let long_text = "word ".repeat(50);
        assert_eq!(adapter.embed(&long_text, true).unwrap().len(), 4);
        assert_eq!(adapter.embed(&long_text, false).unwrap().len(), 8);
    }
}
