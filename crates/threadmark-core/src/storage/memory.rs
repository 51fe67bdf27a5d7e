//! In-memory chunk store for tests and ephemeral sessions.

use super::types::{ChunkId, ChunkRecord, DocId, SessionId, TopicAssignment, TopicRecord};
use super::{ChunkStore, StoreError};
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Insertion order is scan order.
    chunks: Vec<ChunkRecord>,
    topics: Vec<TopicRecord>,
    assignments: Vec<TopicAssignment>,
}

/// Chunk store holding everything in memory behind one RwLock.
///
/// The single lock makes every operation, including the cascade delete,
/// trivially atomic. Not intended for large corpora.
#[derive(Default)]
pub struct InMemoryChunkStore {
    inner: RwLock<Inner>,
}

impl InMemoryChunkStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::DatabaseError(format!("Lock poisoned: {}", e))
}

#[async_trait::async_trait(?Send)]
impl ChunkStore for InMemoryChunkStore {
    async fn put_chunk(&self, chunk: &ChunkRecord) -> Result<ChunkId, StoreError> {
        let mut inner = self.inner.write().map_err(lock_err)?;
        // Caller-assigned identity: same id overwrites in place.
        if let Some(existing) = inner.chunks.iter_mut().find(|c| c.id == chunk.id) {
            *existing = chunk.clone();
        } else {
            inner.chunks.push(chunk.clone());
        }
        Ok(chunk.id)
    }

    async fn scan_session(&self, session: &SessionId) -> Result<Vec<ChunkRecord>, StoreError> {
        let inner = self.inner.read().map_err(lock_err)?;
        Ok(inner
            .chunks
            .iter()
            .filter(|c| &c.session_id == session)
            .cloned()
            .collect())
    }

    async fn delete_scope(
        &self,
        session: &SessionId,
        doc: Option<&DocId>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().map_err(lock_err)?;

        let in_scope = |c: &ChunkRecord| {
            &c.session_id == session && doc.is_none_or(|d| &c.doc_id == d)
        };
        let deleted_ids: HashSet<ChunkId> = inner
            .chunks
            .iter()
            .filter(|c| in_scope(c))
            .map(|c| c.id)
            .collect();

        inner.chunks.retain(|c| !in_scope(c));
        inner
            .assignments
            .retain(|a| !(&a.session_id == session && deleted_ids.contains(&a.chunk_id)));
        inner
            .topics
            .retain(|t| !(&t.session_id == session && doc.is_none_or(|d| &t.doc_id == d)));

        Ok(deleted_ids.len() as u64)
    }

    async fn put_topic(&self, topic: &TopicRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(lock_err)?;
        if let Some(existing) = inner
            .topics
            .iter_mut()
            .find(|t| t.session_id == topic.session_id && t.topic_id == topic.topic_id)
        {
            *existing = topic.clone();
        } else {
            inner.topics.push(topic.clone());
        }
        Ok(())
    }

    async fn assign_topic(&self, assignment: &TopicAssignment) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(lock_err)?;
        inner.assignments.push(assignment.clone());
        Ok(())
    }

    async fn topics_for(&self, session: &SessionId) -> Result<Vec<TopicRecord>, StoreError> {
        let inner = self.inner.read().map_err(lock_err)?;
        Ok(inner
            .topics
            .iter()
            .filter(|t| &t.session_id == session)
            .cloned()
            .collect())
    }

    async fn topic_members(
        &self,
        session: &SessionId,
        topic_id: &str,
    ) -> Result<Vec<(ChunkId, f32)>, StoreError> {
        let inner = self.inner.read().map_err(lock_err)?;
        Ok(inner
            .assignments
            .iter()
            .filter(|a| &a.session_id == session && a.topic_id == topic_id)
            .map(|a| (a.chunk_id, a.relevance))
            .collect())
    }

    async fn assigned_chunk_ids(
        &self,
        session: &SessionId,
    ) -> Result<HashSet<ChunkId>, StoreError> {
        let inner = self.inner.read().map_err(lock_err)?;
        Ok(inner
            .assignments
            .iter()
            .filter(|a| &a.session_id == session)
            .map(|a| a.chunk_id)
            .collect())
    }

    async fn chunk_count(&self) -> Result<usize, StoreError> {
        let inner = self.inner.read().map_err(lock_err)?;
        Ok(inner.chunks.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(lock_err)?;
        inner.chunks.clear();
        inner.topics.clear();
        inner.assignments.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_chunk;

    #[tokio::test]
    async fn test_put_then_scan() {
        let store = InMemoryChunkStore::new();
        let session = SessionId::from("s1");

        store
            .put_chunk(&make_chunk(&session, "d1", "hello world"))
            .await
            .unwrap();
        store
            .put_chunk(&make_chunk(&session, "d1", "second chunk"))
            .await
            .unwrap();
        store
            .put_chunk(&make_chunk(&SessionId::from("other"), "d1", "elsewhere"))
            .await
            .unwrap();

        let chunks = store.scan_session(&session).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[1].text, "second chunk");
    }

    #[tokio::test]
    async fn test_scan_unknown_session_is_empty() {
        let store = InMemoryChunkStore::new();
        let chunks = store.scan_session(&SessionId::from("nope")).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_put_same_id_overwrites() {
        let store = InMemoryChunkStore::new();
        let session = SessionId::from("s1");
        let mut chunk = make_chunk(&session, "d1", "original");
        store.put_chunk(&chunk).await.unwrap();

        chunk.text = "replaced".to_string();
        store.put_chunk(&chunk).await.unwrap();

        let chunks = store.scan_session(&session).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "replaced");
    }

    #[tokio::test]
    async fn test_delete_session_scope() {
        let store = InMemoryChunkStore::new();
        let session = SessionId::from("s1");
        store
            .put_chunk(&make_chunk(&session, "d1", "one"))
            .await
            .unwrap();
        store
            .put_chunk(&make_chunk(&session, "d2", "two"))
            .await
            .unwrap();

        let deleted = store.delete_scope(&session, None).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.scan_session(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_document_scope_leaves_other_documents() {
        let store = InMemoryChunkStore::new();
        let session = SessionId::from("s1");
        store
            .put_chunk(&make_chunk(&session, "d1", "one"))
            .await
            .unwrap();
        store
            .put_chunk(&make_chunk(&session, "d2", "two"))
            .await
            .unwrap();

        let deleted = store
            .delete_scope(&session, Some(&DocId::from("d1")))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.scan_session(&session).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].doc_id, DocId::from("d2"));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_scope_returns_zero() {
        let store = InMemoryChunkStore::new();
        let deleted = store
            .delete_scope(&SessionId::from("ghost"), None)
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_topic_relations() {
        let store = InMemoryChunkStore::new();
        let session = SessionId::from("s1");
        let chunk = make_chunk(&session, "d1", "topical content");
        store.put_chunk(&chunk).await.unwrap();
        store
            .put_topic(&TopicRecord {
                session_id: session.clone(),
                doc_id: DocId::from("d1"),
                topic_id: "0".to_string(),
                keywords: vec!["topical".to_string()],
            })
            .await
            .unwrap();
        store
            .assign_topic(&TopicAssignment {
                session_id: session.clone(),
                chunk_id: chunk.id,
                topic_id: "0".to_string(),
                relevance: 0.9,
            })
            .await
            .unwrap();

        store
            .delete_scope(&session, Some(&DocId::from("d1")))
            .await
            .unwrap();

        assert!(store.topics_for(&session).await.unwrap().is_empty());
        assert!(store
            .topic_members(&session, "0")
            .await
            .unwrap()
            .is_empty());
        assert!(store.assigned_chunk_ids(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_topic_membership_queries() {
        let store = InMemoryChunkStore::new();
        let session = SessionId::from("s1");
        let a = make_chunk(&session, "d1", "assigned chunk");
        let b = make_chunk(&session, "d1", "free chunk");
        store.put_chunk(&a).await.unwrap();
        store.put_chunk(&b).await.unwrap();

        store
            .assign_topic(&TopicAssignment {
                session_id: session.clone(),
                chunk_id: a.id,
                topic_id: "2".to_string(),
                relevance: 0.7,
            })
            .await
            .unwrap();

        let members = store.topic_members(&session, "2").await.unwrap();
        assert_eq!(members, vec![(a.id, 0.7)]);

        let assigned = store.assigned_chunk_ids(&session).await.unwrap();
        assert!(assigned.contains(&a.id));
        assert!(!assigned.contains(&b.id));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryChunkStore::new();
        let session = SessionId::from("s1");
        store
            .put_chunk(&make_chunk(&session, "d1", "text"))
            .await
            .unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 0);
    }
}
