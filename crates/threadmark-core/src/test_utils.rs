//! Shared helpers for unit tests.

use crate::embedding::{EmbeddingAdapter, TokenEncoder};
use crate::error::EmbeddingError;
use crate::storage::{ChunkId, ChunkRecord, DocId, SessionId};
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Embedding dimension used by test encoders.
pub const TEST_DIM: usize = 32;

/// Deterministic unit vector derived from a seed.
///
/// The same seed always yields the same vector, so identical tokens embed
/// identically (cosine similarity exactly 1.0) while distinct tokens land on
/// effectively random directions.
pub fn unit_vector(seed: u64, dim: usize) -> Vec<f32> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(0x1234_5678);
    let mut v = Vec::with_capacity(dim);
    for _ in 0..dim {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        v.push((state >> 40) as f32 / (1u64 << 24) as f32 - 0.5);
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Token encoder producing a stable unit vector per token id.
///
/// Query and document paths agree, so a query token matches an identical
/// chunk token with similarity exactly 1.0.
pub struct HashTokenEncoder {
    dim: usize,
}

impl HashTokenEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn rows(&self, token_ids: &[u32]) -> Vec<Vec<f32>> {
        token_ids
            .iter()
            .map(|&id| unit_vector(id as u64, self.dim))
            .collect()
    }
}

impl TokenEncoder for HashTokenEncoder {
    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn encode_query(
        &self,
        token_ids: &[u32],
        _attention_mask: &[u32],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(self.rows(token_ids))
    }

    fn encode_doc(
        &self,
        token_ids: &[u32],
        _attention_mask: &[u32],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(self.rows(token_ids))
    }
}

/// Builds a word-level tokenizer over the given vocabulary.
///
/// Ids: `[PAD]` = 0, `[UNK]` = 1, then the given words in order. Lowercases
/// and splits on whitespace/punctuation boundaries.
pub fn word_tokenizer(words: &[&str]) -> Tokenizer {
    let mut vocab = serde_json::Map::new();
    vocab.insert("[PAD]".to_string(), json!(0));
    vocab.insert("[UNK]".to_string(), json!(1));
    for (i, word) in words.iter().enumerate() {
        vocab.insert(word.to_lowercase(), json!(i as u64 + 2));
    }

    let tokenizer_json = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": {"type": "Lowercase"},
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": serde_json::Value::Object(vocab),
            "unk_token": "[UNK]"
        }
    });

    Tokenizer::from_bytes(serde_json::to_vec(&tokenizer_json).expect("serialize tokenizer"))
        .expect("build word-level tokenizer")
}

/// Adapter over a [`HashTokenEncoder`] and a word-level tokenizer.
pub fn test_adapter(vocab: &[&str]) -> EmbeddingAdapter {
    EmbeddingAdapter::new(
        Arc::new(HashTokenEncoder::new(TEST_DIM)),
        word_tokenizer(vocab),
        16,
        16,
    )
    .expect("build test adapter")
}

/// Builds a chunk record with deterministic per-token embeddings.
pub fn make_chunk(session: &SessionId, doc: &str, text: &str) -> ChunkRecord {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    let embedding = tokens
        .iter()
        .map(|t| {
            let mut hasher = DefaultHasher::new();
            t.hash(&mut hasher);
            unit_vector(hasher.finish(), TEST_DIM)
        })
        .collect();
    ChunkRecord {
        id: ChunkId::new(),
        session_id: session.clone(),
        doc_id: DocId::from(doc),
        text: text.to_string(),
        word_count: tokens.len(),
        token_count: tokens.len(),
        tokens,
        embedding,
    }
}
