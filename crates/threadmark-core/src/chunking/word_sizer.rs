//! Word-count sizer for text-splitter integration.

use text_splitter::ChunkSizer;

/// Counts whitespace-delimited words in a text span.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// ChunkSizer implementation measuring chunks in words.
///
/// Used by the hard-split fallback so its bound matches the semantic
/// chunker's word budget.
pub struct WordSizer;

impl ChunkSizer for WordSizer {
    fn size(&self, chunk: &str) -> usize {
        count_words(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("one"), 1);
        assert_eq!(count_words("  one   two\tthree\n"), 3);
    }
}
