//! Lexical indexing over a session's chunk corpus.

mod sparse;

pub use sparse::SparseIndex;
