//! Error types for threadmark-core.
//!
//! Storage errors live in [`crate::storage`] next to the trait they belong
//! to; retrieval errors in [`crate::retrieval`]. This module holds the
//! embedding error taxonomy shared by the adapter and encoder
//! implementations.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Failed to load encoder weights or configuration
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    /// Failed to create a tensor during inference
    #[error("Failed to create tensor: {0}")]
    TensorCreation(String),
    /// Forward pass through the encoder failed
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    /// Failed to tokenize text
    #[error("Tokenization failed: {0}")]
    TokenizationFailed(String),
    /// Tokenizer not available or initialization failed
    #[error("Tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),
    /// Invalid encoder or adapter configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
