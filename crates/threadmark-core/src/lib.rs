//! # Threadmark Core
//!
//! Per-conversation hybrid retrieval engine combining token-level dense
//! similarity (MaxSim over ColBERT-style embeddings) with classical BM25
//! lexical scoring.
//!
//! Every document, chunk, and topic belongs to exactly one *session* (a
//! conversation). Ingestion chunks a document, embeds each chunk at the token
//! level, persists it, and keeps the session's sparse index current. Queries
//! scan the session's chunks, score each one densely and sparsely, fuse the
//! two signals, and return the top passages.
//!
//! ## Modules
//!
//! - [`retrieval`] - Hybrid retriever (ingest / query / remove) and score fusion
//! - [`index`] - Incrementally updatable BM25 sparse index
//! - [`storage`] - Session-scoped chunk and topic store (in-memory, redb)
//! - [`embedding`] - Token-level embedding adapter and encoder implementations
//! - [`chunking`] - Semantic text chunking
//! - [`config`] - Production configuration constants
//! - [`error`] - Error types shared across modules

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod retrieval;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;
