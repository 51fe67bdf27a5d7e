//! Core identifiers and stored record types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session identifier - the isolation boundary for all indexing and
/// retrieval. Every chunk, document, and topic belongs to exactly one
/// session. Caller-assigned (a conversation id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Document identifier, scoped to a session. Caller-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Unique chunk identifier, store-assigned.
///
/// IDs are generated from an atomic counter so ingestion from multiple tasks
/// never collides. Persistent stores re-initialize the counter from the
/// highest stored id at open via [`ChunkId::init_counter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(u64);

static CHUNK_ID_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

impl ChunkId {
    /// Generates the next unique chunk id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        use std::sync::atomic::Ordering;
        Self(CHUNK_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Moves the id counter past the given maximum existing id.
    ///
    /// Call after opening a persistent store so new ids don't collide with
    /// loaded ones. Only ever moves the counter forward.
    pub fn init_counter(max_existing_id: u64) {
        use std::sync::atomic::Ordering;
        CHUNK_ID_COUNTER.fetch_max(max_existing_id.saturating_add(1), Ordering::SeqCst);
    }

    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// The atomic retrieval unit.
///
/// A chunk is immutable once written: it is never edited, only deleted and
/// re-ingested. `tokens` is the tokenized form shared by dense-embedding
/// alignment and lexical indexing; `embedding` holds one L2-normalized
/// vector per valid (non-padding) token, serialized as a JSON
/// array-of-arrays when persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk identifier
    pub id: ChunkId,
    /// Owning session
    pub session_id: SessionId,
    /// Owning document within the session
    pub doc_id: DocId,
    /// Raw passage text
    pub text: String,
    /// Tokenized form (padding-free, aligned with `embedding` rows)
    pub tokens: Vec<String>,
    /// Token-level embedding matrix; rows = valid tokens
    pub embedding: Vec<Vec<f32>>,
    /// Whitespace word count (diagnostics, not used in scoring)
    pub word_count: usize,
    /// Valid token count (diagnostics, not used in scoring)
    pub token_count: usize,
}

/// A topic discovered for a document by the external topic modeler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    /// Owning session
    pub session_id: SessionId,
    /// Document the topic was modeled from
    pub doc_id: DocId,
    /// Topic identifier, unique within the session
    pub topic_id: String,
    /// Representative keywords for query matching
    pub keywords: Vec<String>,
}

/// Weighted membership of a chunk in a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicAssignment {
    /// Owning session
    pub session_id: SessionId,
    /// Member chunk
    pub chunk_id: ChunkId,
    /// Topic the chunk belongs to
    pub topic_id: String,
    /// Membership weight in [0, 1]
    pub relevance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ids_are_unique() {
        let a = ChunkId::new();
        let b = ChunkId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_init_counter_only_moves_forward() {
        let before = ChunkId::new();
        ChunkId::init_counter(0);
        let after = ChunkId::new();
        assert!(after.as_u64() > before.as_u64());
    }

    #[test]
    fn test_chunk_record_embedding_serializes_as_nested_arrays() {
        let record = ChunkRecord {
            id: ChunkId::from_u64(7),
            session_id: SessionId::from("s1"),
            doc_id: DocId::from("d1"),
            text: "hello".to_string(),
            tokens: vec!["hello".to_string()],
            embedding: vec![vec![0.6, 0.8]],
            word_count: 1,
            token_count: 1,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["embedding"][0][1], 0.8);

        let back: ChunkRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.embedding, record.embedding);
        assert_eq!(back.session_id, record.session_id);
    }
}
