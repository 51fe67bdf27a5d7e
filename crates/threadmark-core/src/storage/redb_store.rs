//! Redb-backed chunk store.
//!
//! Uses [redb](https://github.com/cberner/redb) - a pure Rust, ACID-compliant,
//! embedded B-tree database.
//!
//! # Tables
//!
//! - `chunks`: ChunkId (u64) -> ChunkRecord (JSON, embedding as nested arrays)
//! - `topics`: "{session}\x1f{topic_id}" -> TopicRecord (JSON)
//! - `assignments`: "{session}\x1f{chunk_id}\x1f{topic_id}" -> TopicAssignment (JSON)
//!
//! Chunk ids are monotonically increasing, so iterating the chunks table in
//! key order recovers insertion order. The cascade delete runs inside a
//! single write transaction, which is what makes it atomic.

use super::types::{ChunkId, ChunkRecord, DocId, SessionId, TopicAssignment, TopicRecord};
use super::{ChunkStore, StoreError};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

const CHUNKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const TOPICS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("topics");
const ASSIGNMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("assignments");

/// Separator for composite string keys; never appears in identifiers
/// produced by the callers this store serves.
const KEY_SEP: char = '\u{1f}';

fn db_err<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> StoreError + '_ {
    move |e| StoreError::DatabaseError(format!("{}: {}", context, e))
}

/// Persistent chunk store for native platforms.
pub struct RedbChunkStore {
    db: Arc<Database>,
}

impl RedbChunkStore {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates all tables if missing and moves the chunk id counter past the
    /// highest stored id so new ids never collide with loaded ones.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(db_err("Failed to open database"))?;

        let mut max_id: Option<u64> = None;
        {
            let write_txn = db
                .begin_write()
                .map_err(db_err("Failed to begin write transaction"))?;
            {
                let chunks = write_txn
                    .open_table(CHUNKS_TABLE)
                    .map_err(db_err("Failed to create chunks table"))?;
                for entry in chunks.iter().map_err(db_err("Failed to scan chunks"))? {
                    let (key, _) = entry.map_err(db_err("Failed to read chunk key"))?;
                    max_id = Some(max_id.map_or(key.value(), |m: u64| m.max(key.value())));
                }
                write_txn
                    .open_table(TOPICS_TABLE)
                    .map_err(db_err("Failed to create topics table"))?;
                write_txn
                    .open_table(ASSIGNMENTS_TABLE)
                    .map_err(db_err("Failed to create assignments table"))?;
            }
            write_txn
                .commit()
                .map_err(db_err("Failed to commit table creation"))?;
        }

        if let Some(max_id) = max_id {
            ChunkId::init_counter(max_id);
        }

        Ok(Self { db: Arc::new(db) })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value)
            .map_err(|e| StoreError::SerializationError(format!("Failed to serialize: {}", e)))
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::SerializationError(format!("Failed to deserialize: {}", e)))
    }

    fn topic_key(session: &SessionId, topic_id: &str) -> String {
        format!("{}{}{}", session, KEY_SEP, topic_id)
    }

    fn assignment_key(session: &SessionId, chunk_id: ChunkId, topic_id: &str) -> String {
        format!(
            "{}{}{}{}{}",
            session,
            KEY_SEP,
            chunk_id.as_u64(),
            KEY_SEP,
            topic_id
        )
    }
}

#[async_trait::async_trait(?Send)]
impl ChunkStore for RedbChunkStore {
    async fn put_chunk(&self, chunk: &ChunkRecord) -> Result<ChunkId, StoreError> {
        let bytes = Self::serialize(chunk)?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let mut table = write_txn
                .open_table(CHUNKS_TABLE)
                .map_err(db_err("Failed to open chunks table"))?;
            table
                .insert(chunk.id.as_u64(), bytes.as_slice())
                .map_err(db_err("Failed to insert chunk"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit chunk insert"))?;
        Ok(chunk.id)
    }

    async fn scan_session(&self, session: &SessionId) -> Result<Vec<ChunkRecord>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to open chunks table"))?;

        let mut chunks = Vec::new();
        for entry in table.iter().map_err(db_err("Failed to scan chunks"))? {
            let (_, value) = entry.map_err(db_err("Failed to read chunk"))?;
            let chunk: ChunkRecord = Self::deserialize(value.value())?;
            if &chunk.session_id == session {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    async fn delete_scope(
        &self,
        session: &SessionId,
        doc: Option<&DocId>,
    ) -> Result<u64, StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        let deleted;
        {
            let mut chunks = write_txn
                .open_table(CHUNKS_TABLE)
                .map_err(db_err("Failed to open chunks table"))?;

            let mut doomed_chunks: Vec<u64> = Vec::new();
            for entry in chunks.iter().map_err(db_err("Failed to scan chunks"))? {
                let (key, value) = entry.map_err(db_err("Failed to read chunk"))?;
                let chunk: ChunkRecord = Self::deserialize(value.value())?;
                if &chunk.session_id == session && doc.is_none_or(|d| &chunk.doc_id == d) {
                    doomed_chunks.push(key.value());
                }
            }
            for key in &doomed_chunks {
                chunks
                    .remove(*key)
                    .map_err(db_err("Failed to delete chunk"))?;
            }
            deleted = doomed_chunks.len() as u64;
            let doomed_ids: HashSet<u64> = doomed_chunks.into_iter().collect();

            let mut assignments = write_txn
                .open_table(ASSIGNMENTS_TABLE)
                .map_err(db_err("Failed to open assignments table"))?;
            let mut doomed_keys: Vec<String> = Vec::new();
            for entry in assignments
                .iter()
                .map_err(db_err("Failed to scan assignments"))?
            {
                let (key, value) = entry.map_err(db_err("Failed to read assignment"))?;
                let assignment: TopicAssignment = Self::deserialize(value.value())?;
                if &assignment.session_id == session
                    && doomed_ids.contains(&assignment.chunk_id.as_u64())
                {
                    doomed_keys.push(key.value().to_string());
                }
            }
            for key in &doomed_keys {
                assignments
                    .remove(key.as_str())
                    .map_err(db_err("Failed to delete assignment"))?;
            }

            let mut topics = write_txn
                .open_table(TOPICS_TABLE)
                .map_err(db_err("Failed to open topics table"))?;
            let mut doomed_topics: Vec<String> = Vec::new();
            for entry in topics.iter().map_err(db_err("Failed to scan topics"))? {
                let (key, value) = entry.map_err(db_err("Failed to read topic"))?;
                let topic: TopicRecord = Self::deserialize(value.value())?;
                if &topic.session_id == session && doc.is_none_or(|d| &topic.doc_id == d) {
                    doomed_topics.push(key.value().to_string());
                }
            }
            for key in &doomed_topics {
                topics
                    .remove(key.as_str())
                    .map_err(db_err("Failed to delete topic"))?;
            }
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit cascade delete"))?;
        Ok(deleted)
    }

    async fn put_topic(&self, topic: &TopicRecord) -> Result<(), StoreError> {
        let bytes = Self::serialize(topic)?;
        let key = Self::topic_key(&topic.session_id, &topic.topic_id);
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let mut table = write_txn
                .open_table(TOPICS_TABLE)
                .map_err(db_err("Failed to open topics table"))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(db_err("Failed to insert topic"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit topic insert"))?;
        Ok(())
    }

    async fn assign_topic(&self, assignment: &TopicAssignment) -> Result<(), StoreError> {
        let bytes = Self::serialize(assignment)?;
        let key = Self::assignment_key(
            &assignment.session_id,
            assignment.chunk_id,
            &assignment.topic_id,
        );
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let mut table = write_txn
                .open_table(ASSIGNMENTS_TABLE)
                .map_err(db_err("Failed to open assignments table"))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(db_err("Failed to insert assignment"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit assignment insert"))?;
        Ok(())
    }

    async fn topics_for(&self, session: &SessionId) -> Result<Vec<TopicRecord>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(TOPICS_TABLE)
            .map_err(db_err("Failed to open topics table"))?;

        let mut topics = Vec::new();
        for entry in table.iter().map_err(db_err("Failed to scan topics"))? {
            let (_, value) = entry.map_err(db_err("Failed to read topic"))?;
            let topic: TopicRecord = Self::deserialize(value.value())?;
            if &topic.session_id == session {
                topics.push(topic);
            }
        }
        Ok(topics)
    }

    async fn topic_members(
        &self,
        session: &SessionId,
        topic_id: &str,
    ) -> Result<Vec<(ChunkId, f32)>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(ASSIGNMENTS_TABLE)
            .map_err(db_err("Failed to open assignments table"))?;

        let mut members = Vec::new();
        for entry in table.iter().map_err(db_err("Failed to scan assignments"))? {
            let (_, value) = entry.map_err(db_err("Failed to read assignment"))?;
            let assignment: TopicAssignment = Self::deserialize(value.value())?;
            if &assignment.session_id == session && assignment.topic_id == topic_id {
                members.push((assignment.chunk_id, assignment.relevance));
            }
        }
        Ok(members)
    }

    async fn assigned_chunk_ids(
        &self,
        session: &SessionId,
    ) -> Result<HashSet<ChunkId>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(ASSIGNMENTS_TABLE)
            .map_err(db_err("Failed to open assignments table"))?;

        let mut ids = HashSet::new();
        for entry in table.iter().map_err(db_err("Failed to scan assignments"))? {
            let (_, value) = entry.map_err(db_err("Failed to read assignment"))?;
            let assignment: TopicAssignment = Self::deserialize(value.value())?;
            if &assignment.session_id == session {
                ids.insert(assignment.chunk_id);
            }
        }
        Ok(ids)
    }

    async fn chunk_count(&self) -> Result<usize, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to open chunks table"))?;
        let len = table.len().map_err(db_err("Failed to count chunks"))?;
        Ok(len as usize)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        write_txn
            .delete_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to drop chunks table"))?;
        write_txn
            .delete_table(TOPICS_TABLE)
            .map_err(db_err("Failed to drop topics table"))?;
        write_txn
            .delete_table(ASSIGNMENTS_TABLE)
            .map_err(db_err("Failed to drop assignments table"))?;
        write_txn
            .open_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to recreate chunks table"))?;
        write_txn
            .open_table(TOPICS_TABLE)
            .map_err(db_err("Failed to recreate topics table"))?;
        write_txn
            .open_table(ASSIGNMENTS_TABLE)
            .map_err(db_err("Failed to recreate assignments table"))?;
        write_txn
            .commit()
            .map_err(db_err("Failed to commit clear"))?;
        Ok(())
    }
}
