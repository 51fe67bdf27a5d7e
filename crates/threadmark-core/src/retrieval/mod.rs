//! Hybrid retrieval: ingestion, scoring, and session lifecycle.
//!
//! [`HybridRetriever`] orchestrates the whole pipeline. Ingestion pushes a
//! document through chunking, document-mode embedding, and the chunk store,
//! keeping the session's sparse index current. A query embeds the text in
//! query mode, scans the session's chunks, scores each candidate densely
//! (MaxSim) and sparsely (BM25 against the query tokens), fuses the two
//! signals, and returns the top passages.
//!
//! # Session index lifecycle
//!
//! Each session's sparse index cache moves through
//! `ABSENT -> BUILT -> STALE -> BUILT -> ABSENT`. Ingestion extends a built
//! index in place; document removal marks it stale; session removal drops
//! it. A query never scores against a stale index - staleness (or any
//! divergence between the cached rows and the scanned chunks) triggers a
//! synchronous rebuild under the session's write lock.
//!
//! # Concurrency
//!
//! Sessions share nothing. Within a session, ingestion and removal hold the
//! session's write lock (single writer); queries hold the read lock and may
//! run concurrently with each other, upgrading only to rebuild.

mod scoring;
mod topics;

pub use scoring::{max_sim, FusionPolicy};

use crate::chunking::{count_words, SemanticChunker};
use crate::embedding::{ChunkEmbedding, EmbeddingAdapter};
use crate::error::EmbeddingError;
use crate::index::SparseIndex;
use crate::storage::{ChunkId, ChunkRecord, ChunkStore, DocId, SessionId, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Errors surfaced by the retrieval API.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Encoder or tokenizer failure - fatal to the single call
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Store failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    /// Malformed query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// One ranked retrieval result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Passage text
    pub text: String,
    /// Fused relevance score (higher is better)
    pub score: f32,
    /// Document the passage came from
    pub doc_id: DocId,
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunks embedded and persisted
    pub chunks_indexed: usize,
    /// Chunks dropped after a per-chunk embedding or storage failure
    pub chunks_skipped: usize,
    /// Whether ingestion stopped early on a cancellation signal
    pub cancelled: bool,
}

/// Scope of a removal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalScope {
    /// The whole session was removed
    Session,
    /// A single document within the session was removed
    Document,
}

/// Outcome of a removal call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalSummary {
    /// Number of chunks deleted
    pub deleted_chunks: u64,
    /// What was removed
    pub scope: RemovalScope,
}

/// Construction-time retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Word budget per chunk
    pub max_chunk_words: usize,
    /// Coherence threshold for the semantic chunker
    pub similarity_threshold: f32,
    /// How dense and sparse scores combine
    pub fusion: FusionPolicy,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_chunk_words: crate::config::MAX_CHUNK_WORDS,
            similarity_threshold: crate::config::SIMILARITY_THRESHOLD,
            fusion: FusionPolicy::default(),
        }
    }
}

/// Cached sparse index of one session, with the chunk id of every row.
struct BuiltIndex {
    sparse: SparseIndex,
    row_ids: Vec<ChunkId>,
}

impl BuiltIndex {
    fn from_chunks(chunks: &[ChunkRecord]) -> Self {
        let token_lists: Vec<Vec<String>> = chunks.iter().map(|c| c.tokens.clone()).collect();
        Self {
            sparse: SparseIndex::build(&token_lists),
            row_ids: chunks.iter().map(|c| c.id).collect(),
        }
    }

    /// Whether the cached rows cover exactly the scanned chunk set.
    ///
    /// Dense and sparse scoring must operate over the same chunk universe;
    /// any divergence forces a rebuild.
    fn matches(&self, chunks: &[ChunkRecord]) -> bool {
        self.row_ids.len() == chunks.len()
            && self
                .row_ids
                .iter()
                .zip(chunks.iter())
                .all(|(id, chunk)| *id == chunk.id)
    }
}

/// Sparse index cache state for one session.
#[derive(Default)]
enum IndexState {
    /// No index cached (new session, or session removed)
    #[default]
    Absent,
    /// Index current with the store
    Built(BuiltIndex),
    /// Store changed since the index was built; rebuild before scoring
    Stale,
}

#[derive(Default)]
struct SessionIndex {
    state: IndexState,
}

/// Candidate restriction for the topic-filtered path: the selected topic's
/// members plus every chunk with no topic assignment at all.
struct CandidateFilter {
    members: HashSet<ChunkId>,
    assigned: HashSet<ChunkId>,
}

impl CandidateFilter {
    fn allows(&self, id: ChunkId) -> bool {
        self.members.contains(&id) || !self.assigned.contains(&id)
    }
}

/// Hybrid retriever owning its store, embedding adapter, and per-session
/// index caches.
///
/// Construct one per process (or per store) and hand out references;
/// everything else is per-session state managed internally.
pub struct HybridRetriever<S: ChunkStore> {
    store: S,
    adapter: EmbeddingAdapter,
    chunker: SemanticChunker,
    fusion: FusionPolicy,
    sessions: RwLock<HashMap<SessionId, Arc<RwLock<SessionIndex>>>>,
}

impl<S: ChunkStore> HybridRetriever<S> {
    /// Creates a retriever with default configuration.
    pub fn new(store: S, adapter: EmbeddingAdapter) -> Self {
        Self::with_config(store, adapter, RetrieverConfig::default())
    }

    /// Creates a retriever with explicit configuration.
    pub fn with_config(store: S, adapter: EmbeddingAdapter, config: RetrieverConfig) -> Self {
        Self {
            store,
            adapter,
            chunker: SemanticChunker::new(config.max_chunk_words, config.similarity_threshold),
            fusion: config.fusion,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingests a document into a session.
    ///
    /// Chunks the text, embeds each chunk in document mode, persists it, and
    /// extends the session's sparse index. A per-chunk embedding or storage
    /// failure is logged and that chunk skipped; the rest of the document
    /// still lands.
    pub async fn ingest(
        &self,
        session: &SessionId,
        doc: &DocId,
        text: &str,
    ) -> Result<IngestReport, RetrievalError> {
        self.ingest_with_cancel(session, doc, text, None).await
    }

    /// [`ingest`](Self::ingest) with cooperative cancellation.
    ///
    /// The flag is checked once per chunk; when it flips, ingestion stops
    /// between chunks and the report says so. Chunks already persisted stay.
    pub async fn ingest_with_cancel(
        &self,
        session: &SessionId,
        doc: &DocId,
        text: &str,
        cancel: Option<&AtomicBool>,
    ) -> Result<IngestReport, RetrievalError> {
        let entry = self.session_entry(session).await;
        // Single writer per session: no query observes a half-updated index.
        let mut guard = entry.write().await;

        let mut indexed = 0usize;
        let mut skipped = 0usize;
        let mut cancelled = false;
        let mut new_ids: Vec<ChunkId> = Vec::new();
        let mut new_tokens: Vec<Vec<String>> = Vec::new();

        for passage in self.chunker.chunk(text) {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                cancelled = true;
                break;
            }

            let embedded = match self.adapter.embed(&passage, false) {
                Ok(e) if !e.is_empty() => e,
                Ok(_) => {
                    warn!(session = %session, "chunk produced no valid tokens, skipping");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(session = %session, error = %e, "failed to embed chunk, skipping");
                    skipped += 1;
                    continue;
                }
            };

            let record = ChunkRecord {
                id: ChunkId::new(),
                session_id: session.clone(),
                doc_id: doc.clone(),
                word_count: count_words(&passage),
                token_count: embedded.len(),
                text: passage,
                tokens: embedded.tokens,
                embedding: embedded.vectors,
            };

            match self.store.put_chunk(&record).await {
                Ok(id) => {
                    indexed += 1;
                    new_ids.push(id);
                    new_tokens.push(record.tokens);
                }
                Err(e) => {
                    warn!(session = %session, error = %e, "failed to store chunk, skipping");
                    skipped += 1;
                }
            }
        }

        // A built index is extended in place and stays current; an absent or
        // stale one is rebuilt lazily on the next query.
        if let IndexState::Built(built) = &mut guard.state {
            built.sparse.extend(&new_tokens);
            built.row_ids.extend(new_ids);
        }

        info!(
            session = %session,
            doc = %doc,
            indexed,
            skipped,
            cancelled,
            "ingestion finished"
        );
        Ok(IngestReport {
            chunks_indexed: indexed,
            chunks_skipped: skipped,
            cancelled,
        })
    }

    /// Retrieves the `top_k` most relevant passages for a query, scanning
    /// the session's full corpus.
    ///
    /// Returns an empty list for an empty or unknown session. Results are
    /// sorted by fused score descending; ties keep insertion order.
    pub async fn query(
        &self,
        session: &SessionId,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.query_inner(session, query_text, top_k, None).await
    }

    /// Retrieves passages with topic-based candidate pre-filtering.
    ///
    /// Picks the session topic whose keywords best overlap the query and
    /// restricts candidates to that topic's members plus all unassigned
    /// chunks. Falls back to full-corpus retrieval when the session has no
    /// topics or the best overlap is zero - topic filtering is an
    /// optimization, never a source of missed results.
    pub async fn query_topics(
        &self,
        session: &SessionId,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let all_topics = self.store.topics_for(session).await?;
        if all_topics.is_empty() {
            info!(session = %session, "no topics modeled, using full-corpus retrieval");
            return self.query_inner(session, query_text, top_k, None).await;
        }

        let terms = topics::query_terms(query_text);
        let Some((best, overlap)) = topics::select_topic(&all_topics, &terms) else {
            return self.query_inner(session, query_text, top_k, None).await;
        };
        if overlap == 0 {
            info!(session = %session, "no topic keyword overlap, using full-corpus retrieval");
            return self.query_inner(session, query_text, top_k, None).await;
        }

        debug!(session = %session, topic = %best.topic_id, overlap, "topic-filtered retrieval");
        let members: HashSet<ChunkId> = self
            .store
            .topic_members(session, &best.topic_id)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let assigned = self.store.assigned_chunk_ids(session).await?;

        self.query_inner(
            session,
            query_text,
            top_k,
            Some(CandidateFilter { members, assigned }),
        )
        .await
    }

    /// Removes a whole session, or one document within it.
    ///
    /// Delegates to the store's cascading delete, then invalidates the
    /// session's cached sparse index so the next query rebuilds it.
    pub async fn remove(
        &self,
        session: &SessionId,
        doc: Option<&DocId>,
    ) -> Result<RemovalSummary, RetrievalError> {
        let entry = self.session_entry(session).await;
        let mut guard = entry.write().await;

        let deleted = self.store.delete_scope(session, doc).await?;
        let scope = match doc {
            Some(_) => {
                guard.state = IndexState::Stale;
                RemovalScope::Document
            }
            None => {
                guard.state = IndexState::Absent;
                RemovalScope::Session
            }
        };
        drop(guard);

        if scope == RemovalScope::Session {
            self.sessions.write().await.remove(session);
        }

        info!(session = %session, deleted, ?scope, "removed chunks");
        Ok(RemovalSummary {
            deleted_chunks: deleted,
            scope,
        })
    }

    async fn query_inner(
        &self,
        session: &SessionId,
        query_text: &str,
        top_k: usize,
        filter: Option<CandidateFilter>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if query_text.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "Number of results (top_k) must be greater than 0".to_string(),
            ));
        }

        let query_emb = self.adapter.embed(query_text, true)?;
        let entry = self.session_entry(session).await;

        // Fast path: current index, read lock only.
        {
            let guard = entry.read().await;
            if let IndexState::Built(built) = &guard.state {
                let chunks = self.store.scan_session(session).await?;
                if built.matches(&chunks) {
                    return Ok(self.rank(&chunks, built, &query_emb, top_k, filter.as_ref()));
                }
                debug!(session = %session, "cached sparse index out of date");
            }
        }

        // Slow path: rebuild under the session's write lock.
        let mut guard = entry.write().await;
        let chunks = self.store.scan_session(session).await?;
        if chunks.is_empty() {
            guard.state = IndexState::Absent;
            return Ok(Vec::new());
        }

        let built = BuiltIndex::from_chunks(&chunks);
        info!(session = %session, chunks = chunks.len(), "built sparse index");
        let results = self.rank(&chunks, &built, &query_emb, top_k, filter.as_ref());
        guard.state = IndexState::Built(built);
        Ok(results)
    }

    /// Scores candidates densely and sparsely, fuses, sorts, truncates.
    fn rank(
        &self,
        chunks: &[ChunkRecord],
        built: &BuiltIndex,
        query: &ChunkEmbedding,
        top_k: usize,
        filter: Option<&CandidateFilter>,
    ) -> Vec<ScoredChunk> {
        // Sparse scores are joined to chunks by id, so both score families
        // cover exactly the scanned chunk universe.
        let sparse_by_id: HashMap<ChunkId, f64> = built
            .row_ids
            .iter()
            .copied()
            .zip(built.sparse.scores(&query.tokens))
            .collect();

        let mut scored: Vec<(f32, &ChunkRecord)> = chunks
            .iter()
            .filter(|chunk| filter.is_none_or(|f| f.allows(chunk.id)))
            .map(|chunk| {
                let dense = max_sim(&query.vectors, &chunk.embedding);
                let sparse = sparse_by_id.get(&chunk.id).copied().unwrap_or(0.0) as f32;
                (self.fusion.fuse(dense, sparse), chunk)
            })
            .collect();

        // Stable sort: equal scores keep insertion order, so results are
        // deterministic.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| ScoredChunk {
                text: chunk.text.clone(),
                score,
                doc_id: chunk.doc_id.clone(),
            })
            .collect()
    }

    async fn session_entry(&self, session: &SessionId) -> Arc<RwLock<SessionIndex>> {
        if let Some(entry) = self.sessions.read().await.get(session) {
            return entry.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions.entry(session.clone()).or_default().clone()
    }
}
