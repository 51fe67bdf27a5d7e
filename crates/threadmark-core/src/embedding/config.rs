//! Encoder checkpoint configuration.

use serde::Deserialize;

fn default_dim() -> usize {
    crate::config::EMBEDDING_DIM
}

fn default_query_maxlen() -> usize {
    crate::config::QUERY_MAXLEN
}

fn default_doc_maxlen() -> usize {
    crate::config::DOC_MAXLEN
}

fn default_mask_punctuation() -> bool {
    true
}

/// Retrieval head configuration stored in a checkpoint's `config.json`.
///
/// The same file also carries the standard BERT encoder fields; those are
/// deserialized separately into the candle BERT config. Unknown keys are
/// ignored on both passes.
#[derive(Debug, Clone, Deserialize)]
pub struct ColbertConfig {
    /// Projection output dimension
    #[serde(default = "default_dim")]
    pub dim: usize,
    /// Token budget for the query encoding path
    #[serde(default = "default_query_maxlen")]
    pub query_maxlen: usize,
    /// Token budget for the document encoding path
    #[serde(default = "default_doc_maxlen")]
    pub doc_maxlen: usize,
    /// Whether the document path zeroes punctuation token vectors
    #[serde(default = "default_mask_punctuation")]
    pub mask_punctuation: bool,
}

impl Default for ColbertConfig {
    fn default() -> Self {
        Self {
            dim: default_dim(),
            query_maxlen: default_query_maxlen(),
            doc_maxlen: default_doc_maxlen(),
            mask_punctuation: default_mask_punctuation(),
        }
    }
}
