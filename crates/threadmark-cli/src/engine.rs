//! Retriever construction from on-disk assets.

use crate::config;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use threadmark_core::embedding::{ColbertEncoder, EmbeddingAdapter};
use threadmark_core::retrieval::HybridRetriever;
use threadmark_core::storage::RedbChunkStore;
use tokenizers::Tokenizer;

/// Opens the store and encoder and wires them into a retriever.
///
/// The retriever is an explicitly constructed value owning its own
/// connections; callers pass it by reference to whatever needs it.
pub fn open_retriever(data_dir: Option<&Path>) -> Result<HybridRetriever<RedbChunkStore>> {
    let model_dir = config::find_model_dir()?;

    let encoder = ColbertEncoder::load(&model_dir)
        .with_context(|| format!("Failed to load encoder from {}", model_dir.display()))?;
    let (query_maxlen, doc_maxlen) = {
        let c = encoder.config();
        (c.query_maxlen, c.doc_maxlen)
    };

    let tokenizer_path = model_dir.join("tokenizer.json");
    let tokenizer_bytes = std::fs::read(&tokenizer_path)
        .with_context(|| format!("Failed to read {}", tokenizer_path.display()))?;
    let tokenizer = Tokenizer::from_bytes(&tokenizer_bytes)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

    let adapter = EmbeddingAdapter::new(Arc::new(encoder), tokenizer, query_maxlen, doc_maxlen)?;

    let db_path = config::database_path(data_dir)?;
    let store = RedbChunkStore::open(&db_path)
        .with_context(|| format!("Failed to open store at {}", db_path.display()))?;

    Ok(HybridRetriever::new(store, adapter))
}
