//! Session-scoped chunk and topic storage.
//!
//! The [`ChunkStore`] trait abstracts over the durable store backing the
//! retrieval engine. Chunks and topic relations are keyed by session (and
//! document within a session); retrieval scans a session's chunks
//! exhaustively, so implementations optimize for sequential scans rather
//! than point lookups.
//!
//! # Implementations
//!
//! - [`InMemoryChunkStore`] - RwLock-guarded vectors, for tests and ephemeral use
//! - [`RedbChunkStore`] - redb-backed persistent store (feature `redb-store`)

mod memory;
mod types;

#[cfg(feature = "redb-store")]
mod redb_store;

pub use memory::InMemoryChunkStore;
pub use types::{ChunkId, ChunkRecord, DocId, SessionId, TopicAssignment, TopicRecord};

#[cfg(feature = "redb-store")]
pub use redb_store::RedbChunkStore;

use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Empty scopes are not errors: scanning an unknown session yields an empty
/// vector and deleting one yields a zero count.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Durable create/read/delete over chunks and topic relations, keyed by
/// session and document.
///
/// # Consistency
///
/// [`delete_scope`](Self::delete_scope) must be atomic from the caller's
/// perspective: either all matched chunks and the topic relations referencing
/// them are removed, or none are. This is the only operation coordinating
/// across chunk and topic data.
#[async_trait::async_trait(?Send)]
pub trait ChunkStore {
    // =========================================================================
    // Chunk Operations
    // =========================================================================

    /// Persists a chunk, returning its id.
    ///
    /// Identity is caller-assigned via `chunk.id`; storing the same id twice
    /// overwrites. No content-based deduplication is attempted.
    async fn put_chunk(&self, chunk: &ChunkRecord) -> Result<ChunkId, StoreError>;

    /// Returns all chunks for a session, in insertion order.
    ///
    /// Used both for dense scoring and for sparse index (re)builds; an
    /// unknown session yields an empty vector, not an error.
    async fn scan_session(&self, session: &SessionId) -> Result<Vec<ChunkRecord>, StoreError>;

    /// Deletes all chunks for a session, or only those of one document.
    ///
    /// Cascades to topic assignments referencing the deleted chunks and to
    /// the topic records of the deleted scope. Returns the number of deleted
    /// chunks; a non-existent scope deletes nothing and returns zero.
    async fn delete_scope(
        &self,
        session: &SessionId,
        doc: Option<&DocId>,
    ) -> Result<u64, StoreError>;

    // =========================================================================
    // Topic Operations
    // =========================================================================

    /// Stores a topic record (upsert by session + topic id).
    async fn put_topic(&self, topic: &TopicRecord) -> Result<(), StoreError>;

    /// Records a chunk's weighted membership in a topic.
    async fn assign_topic(&self, assignment: &TopicAssignment) -> Result<(), StoreError>;

    /// Returns all topics of a session.
    async fn topics_for(&self, session: &SessionId) -> Result<Vec<TopicRecord>, StoreError>;

    /// Returns `(chunk_id, relevance)` pairs for one topic.
    async fn topic_members(
        &self,
        session: &SessionId,
        topic_id: &str,
    ) -> Result<Vec<(ChunkId, f32)>, StoreError>;

    /// Returns the ids of all chunks with at least one topic assignment.
    ///
    /// Chunks absent from this set are topic-agnostic and always remain
    /// retrieval candidates under topic filtering.
    async fn assigned_chunk_ids(&self, session: &SessionId)
        -> Result<HashSet<ChunkId>, StoreError>;

    // =========================================================================
    // Utility Operations
    // =========================================================================

    /// Total number of stored chunks across all sessions.
    async fn chunk_count(&self) -> Result<usize, StoreError>;

    /// Removes all data from the store.
    async fn clear(&self) -> Result<(), StoreError>;
}

// Blanket implementation so one store can back several engines (e.g. tests).
#[async_trait::async_trait(?Send)]
impl<T: ChunkStore> ChunkStore for std::sync::Arc<T> {
    async fn put_chunk(&self, chunk: &ChunkRecord) -> Result<ChunkId, StoreError> {
        (**self).put_chunk(chunk).await
    }

    async fn scan_session(&self, session: &SessionId) -> Result<Vec<ChunkRecord>, StoreError> {
        (**self).scan_session(session).await
    }

    async fn delete_scope(
        &self,
        session: &SessionId,
        doc: Option<&DocId>,
    ) -> Result<u64, StoreError> {
        (**self).delete_scope(session, doc).await
    }

    async fn put_topic(&self, topic: &TopicRecord) -> Result<(), StoreError> {
        (**self).put_topic(topic).await
    }

    async fn assign_topic(&self, assignment: &TopicAssignment) -> Result<(), StoreError> {
        (**self).assign_topic(assignment).await
    }

    async fn topics_for(&self, session: &SessionId) -> Result<Vec<TopicRecord>, StoreError> {
        (**self).topics_for(session).await
    }

    async fn topic_members(
        &self,
        session: &SessionId,
        topic_id: &str,
    ) -> Result<Vec<(ChunkId, f32)>, StoreError> {
        (**self).topic_members(session, topic_id).await
    }

    async fn assigned_chunk_ids(
        &self,
        session: &SessionId,
    ) -> Result<HashSet<ChunkId>, StoreError> {
        (**self).assigned_chunk_ids(session).await
    }

    async fn chunk_count(&self) -> Result<usize, StoreError> {
        (**self).chunk_count().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}
