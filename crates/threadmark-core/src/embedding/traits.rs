//! Encoder abstraction consumed by the embedding adapter.

use crate::error::EmbeddingError;

/// Token-level encoder producing one embedding vector per input token.
///
/// The query and document paths may use different learned projections,
/// reflecting asymmetric query/document semantics. Both return a matrix with
/// exactly one row per input token id (padding included - stripping padding
/// is the adapter's job), each row L2-normalized along the embedding
/// dimension. The document path additionally zeroes punctuation and padding
/// token vectors before normalization.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the retriever shares one encoder
/// across concurrent ingestion and query tasks.
pub trait TokenEncoder: Send + Sync {
    /// Embedding dimension of every returned row.
    fn embedding_dim(&self) -> usize;

    /// Encodes a tokenized query. Returns `[seq_len, dim]`.
    fn encode_query(
        &self,
        token_ids: &[u32],
        attention_mask: &[u32],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Encodes a tokenized document passage. Returns `[seq_len, dim]`.
    fn encode_doc(
        &self,
        token_ids: &[u32],
        attention_mask: &[u32],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
