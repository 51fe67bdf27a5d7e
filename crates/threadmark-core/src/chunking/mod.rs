//! Semantic text chunking.
//!
//! Splits raw document text into bounded, semantically coherent passages
//! before embedding. Sentences are detected with Unicode-aware segmentation,
//! then adjacent sentences are merged into a passage while their term
//! profiles remain similar and the passage stays within the word budget.
//!
//! A sentence that alone exceeds the budget (or text with no usable sentence
//! boundaries) falls back to hard word-bounded splitting via `text-splitter`.

mod word_sizer;

use std::collections::HashMap;
use std::collections::VecDeque;
use text_splitter::{ChunkConfig, TextSplitter};
use unicode_segmentation::UnicodeSegmentation;
use word_sizer::WordSizer;

pub use word_sizer::count_words;

/// Semantic chunker with a word budget and a coherence threshold.
///
/// Produces non-overlapping passages of at most `max_chunk_words` words.
/// Adjacent sentences merge into one passage while the cosine similarity of
/// their term-frequency profiles stays at or above `similarity_threshold`.
///
/// The iterator returned by [`chunk`](Self::chunk) is lazy, finite, and
/// restartable (call `chunk` again for a fresh pass). It never yields an
/// empty passage; empty input yields an empty sequence.
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    max_chunk_words: usize,
    similarity_threshold: f32,
}

impl SemanticChunker {
    /// Creates a chunker.
    ///
    /// # Arguments
    ///
    /// * `max_chunk_words` - Maximum words per passage (must be > 0)
    /// * `similarity_threshold` - Coherence threshold in [0, 1]
    pub fn new(max_chunk_words: usize, similarity_threshold: f32) -> Self {
        Self {
            max_chunk_words: max_chunk_words.max(1),
            similarity_threshold: similarity_threshold.clamp(0.0, 1.0),
        }
    }

    /// Returns the configured word budget.
    pub fn max_chunk_words(&self) -> usize {
        self.max_chunk_words
    }

    /// Splits `text` into coherent passages.
    pub fn chunk(&self, text: &str) -> Chunks {
        let sentences = split_sentences(text);
        Chunks {
            sentences,
            pos: 0,
            pending: VecDeque::new(),
            max_chunk_words: self.max_chunk_words,
            similarity_threshold: self.similarity_threshold,
        }
    }
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new(
            crate::config::MAX_CHUNK_WORDS,
            crate::config::SIMILARITY_THRESHOLD,
        )
    }
}

/// A sentence with its word count and term-frequency profile.
struct Sentence {
    text: String,
    word_count: usize,
    profile: HashMap<String, f32>,
}

/// Lazy iterator over merged passages. See [`SemanticChunker::chunk`].
pub struct Chunks {
    sentences: Vec<Sentence>,
    pos: usize,
    /// Hard-split pieces of an oversized sentence, drained before advancing.
    pending: VecDeque<String>,
    max_chunk_words: usize,
    similarity_threshold: f32,
}

impl Iterator for Chunks {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(piece) = self.pending.pop_front() {
            return Some(piece);
        }

        let first = self.sentences.get(self.pos)?;

        // Oversized sentence: no coherent merge is possible, hard-split it.
        if first.word_count > self.max_chunk_words {
            self.pending = hard_split(&first.text, self.max_chunk_words);
            self.pos += 1;
            return self.pending.pop_front().or_else(|| self.next());
        }

        let mut text = first.text.clone();
        let mut words = first.word_count;
        let mut profile = first.profile.clone();
        self.pos += 1;

        while let Some(next) = self.sentences.get(self.pos) {
            if words + next.word_count > self.max_chunk_words {
                break;
            }
            if cosine(&profile, &next.profile) < self.similarity_threshold {
                break;
            }
            text.push(' ');
            text.push_str(&next.text);
            words += next.word_count;
            for (term, count) in &next.profile {
                *profile.entry(term.clone()).or_insert(0.0) += count;
            }
            self.pos += 1;
        }

        Some(text)
    }
}

/// Splits text into trimmed, non-empty sentences with term profiles.
fn split_sentences(text: &str) -> Vec<Sentence> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Sentence {
            text: s.to_string(),
            word_count: count_words(s),
            profile: term_profile(s),
        })
        .collect()
}

/// Hard word-bounded split for text no sentence merge can accommodate.
fn hard_split(text: &str, max_words: usize) -> VecDeque<String> {
    let config = ChunkConfig::new(max_words)
        .with_sizer(WordSizer)
        .with_trim(true);
    let splitter = TextSplitter::new(config);
    splitter
        .chunks(text)
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Term-frequency profile over lowercased alphanumeric tokens.
fn term_profile(text: &str) -> HashMap<String, f32> {
    let mut profile = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *profile.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    profile
}

/// Cosine similarity between two term profiles.
///
/// Returns 0.0 when either profile is empty, so content-free segments never
/// merge (the coherence signal cannot be computed for them).
fn cosine(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f32 = a
        .iter()
        .filter_map(|(term, &x)| b.get(term).map(|&y| x * y))
        .sum();
    let norm_a: f32 = a.values().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
