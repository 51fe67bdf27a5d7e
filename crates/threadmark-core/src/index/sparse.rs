//! BM25 sparse index for exact term matching.
//!
//! Implements the Okapi BM25 ranking function over a session's tokenized
//! chunk corpus:
//!
//! - **Term Frequency (TF)**: how often a query term appears in a chunk,
//!   saturated by `k1`
//! - **Inverse Document Frequency (IDF)**: rarity of the term across the
//!   corpus, with negative values floored to `epsilon * average_idf`
//! - **Length normalization**: `b` dampens the advantage of long chunks
//!
//! The index is derived state: it is rebuilt or extended from the chunk
//! store and never persisted. [`extend`](SparseIndex::extend) is
//! score-equivalent to a full rebuild on the union of old and new chunks,
//! because document frequency, corpus size, average length, and the IDF
//! table are all recomputed over the full corpus after an append.

use crate::config::{BM25_B, BM25_EPSILON, BM25_K1};
use std::collections::HashMap;

/// Incrementally updatable BM25 index over tokenized chunks.
///
/// Rows are kept in corpus insertion order; [`scores`](Self::scores) returns
/// one score per row in that order. The caller owns the mapping from row to
/// chunk identity.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    /// Per-chunk term counts, parallel to `doc_len`.
    term_freqs: Vec<HashMap<String, usize>>,
    /// Token count per chunk.
    doc_len: Vec<usize>,
    /// Number of chunks each term appears in.
    doc_freq: HashMap<String, usize>,
    /// Average chunk length over the corpus.
    avgdl: f64,
    /// IDF per term, floored per the Okapi convention.
    idf: HashMap<String, f64>,
    k1: f64,
    b: f64,
    epsilon: f64,
}

impl SparseIndex {
    /// Builds an index over a tokenized corpus. O(total tokens).
    ///
    /// An empty corpus yields a valid empty index whose `scores` output is
    /// empty.
    pub fn build(corpus: &[Vec<String>]) -> Self {
        let mut index = Self {
            term_freqs: Vec::new(),
            doc_len: Vec::new(),
            doc_freq: HashMap::new(),
            avgdl: 0.0,
            idf: HashMap::new(),
            k1: BM25_K1,
            b: BM25_B,
            epsilon: BM25_EPSILON,
        };
        index.append(corpus);
        index.recompute_idf();
        index
    }

    /// Appends new chunks and recomputes corpus-wide statistics.
    ///
    /// Equivalent in resulting scores to `build` on the union of the old and
    /// new corpora.
    pub fn extend(&mut self, new_chunks: &[Vec<String>]) {
        if new_chunks.is_empty() {
            return;
        }
        self.append(new_chunks);
        self.recompute_idf();
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.doc_len.len()
    }

    /// Returns `true` if no chunks are indexed.
    pub fn is_empty(&self) -> bool {
        self.doc_len.is_empty()
    }

    /// BM25 score of every indexed chunk against the query tokens.
    ///
    /// Returns one non-negative score per chunk, in insertion order. Query
    /// terms absent from the corpus contribute nothing; repeated query terms
    /// contribute once per repetition.
    pub fn scores(&self, query_tokens: &[String]) -> Vec<f64> {
        (0..self.len())
            .map(|row| self.score_row(query_tokens, row))
            .collect()
    }

    fn score_row(&self, query_tokens: &[String], row: usize) -> f64 {
        let freqs = &self.term_freqs[row];
        let len_norm = 1.0 - self.b + self.b * self.doc_len[row] as f64 / self.avgdl.max(1e-9);
        let mut score = 0.0;
        for term in query_tokens {
            let Some(&tf) = freqs.get(term) else {
                continue;
            };
            let Some(&idf) = self.idf.get(term) else {
                continue;
            };
            let tf = tf as f64;
            score += idf * tf * (self.k1 + 1.0) / (tf + self.k1 * len_norm);
        }
        score
    }

    /// Ingests chunk token lists, updating per-chunk and corpus counts.
    fn append(&mut self, chunks: &[Vec<String>]) {
        for tokens in chunks {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            self.doc_len.push(tokens.len());
            self.term_freqs.push(freqs);
        }
        let total: usize = self.doc_len.iter().sum();
        self.avgdl = if self.doc_len.is_empty() {
            0.0
        } else {
            total as f64 / self.doc_len.len() as f64
        };
    }

    /// Recomputes the IDF table from document frequencies.
    ///
    /// Okapi IDF: `ln((N - df + 0.5) / (df + 0.5))`. Terms appearing in more
    /// than half the corpus would go negative; those are floored to
    /// `epsilon * average_idf` so scores stay non-negative.
    fn recompute_idf(&mut self) {
        let n = self.doc_len.len() as f64;
        self.idf.clear();
        if self.doc_freq.is_empty() {
            return;
        }

        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, &df) in &self.doc_freq {
            let df = df as f64;
            let idf = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += idf;
            if idf < 0.0 {
                negative.push(term.clone());
            }
            self.idf.insert(term.clone(), idf);
        }

        // Clamped at zero so a degenerate corpus (mostly-negative IDFs)
        // cannot push chunk scores negative.
        let average_idf = idf_sum / self.doc_freq.len() as f64;
        let floor = (self.epsilon * average_idf).max(0.0);
        for term in negative {
            self.idf.insert(term, floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(texts: &[&str]) -> Vec<Vec<String>> {
        texts
            .iter()
            .map(|t| t.split_whitespace().map(|w| w.to_lowercase()).collect())
            .collect()
    }

    fn query(text: &str) -> Vec<String> {
        text.split_whitespace().map(|w| w.to_lowercase()).collect()
    }

    #[test]
    fn test_empty_corpus() {
        let index = SparseIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.scores(&query("anything")).is_empty());
    }

    #[test]
    fn test_matching_chunk_outscores_unrelated() {
        let corpus = tokenize(&["the cat sat", "a dog ran fast", "birds fly high"]);
        let index = SparseIndex::build(&corpus);

        let scores = index.scores(&query("cat"));
        assert_eq!(scores.len(), 3);
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_term_frequency_raises_score() {
        let corpus = tokenize(&[
            "rust programming",
            "rust rust rust is a programming language",
            "python programming",
        ]);
        let index = SparseIndex::build(&corpus);

        let scores = index.scores(&query("rust"));
        assert!(
            scores[1] > scores[0],
            "repeated term should score higher: {:?}",
            scores
        );
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        // "common" appears everywhere, "rare" once.
        let corpus = tokenize(&[
            "common rare",
            "common filler words",
            "common other things",
            "common more text",
        ]);
        let index = SparseIndex::build(&corpus);

        let rare = index.scores(&query("rare"))[0];
        let common = index.scores(&query("common"))[0];
        assert!(rare > common, "rare={} common={}", rare, common);
    }

    #[test]
    fn test_scores_are_non_negative() {
        // "the" appears in every chunk, driving its raw IDF negative.
        let corpus = tokenize(&["the cat", "the dog", "the bird", "the fish"]);
        let index = SparseIndex::build(&corpus);

        for score in index.scores(&query("the cat")) {
            assert!(score >= 0.0, "negative score: {}", score);
        }
    }

    #[test]
    fn test_extend_matches_full_rebuild() {
        let first = tokenize(&["the cat sat on the mat", "dogs chase cats"]);
        let second = tokenize(&["birds sing in the morning", "the mat was red"]);

        let mut extended = SparseIndex::build(&first);
        extended.extend(&second);

        let union: Vec<Vec<String>> =
            first.iter().chain(second.iter()).cloned().collect();
        let rebuilt = SparseIndex::build(&union);

        assert_eq!(extended.len(), rebuilt.len());
        for q in ["cat", "the mat", "birds morning", "unrelated"] {
            let a = extended.scores(&query(q));
            let b = rebuilt.scores(&query(q));
            for (x, y) in a.iter().zip(b.iter()) {
                assert!(
                    (x - y).abs() < 1e-9,
                    "query {:?}: extended={} rebuilt={}",
                    q,
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_extend_with_nothing_is_a_noop() {
        let corpus = tokenize(&["alpha beta", "gamma delta"]);
        let mut index = SparseIndex::build(&corpus);
        let before = index.scores(&query("alpha"));
        index.extend(&[]);
        assert_eq!(index.scores(&query("alpha")), before);
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let corpus = tokenize(&["some text here"]);
        let index = SparseIndex::build(&corpus);
        assert_eq!(index.scores(&[]), vec![0.0]);
    }

    #[test]
    fn test_repeated_query_terms_accumulate() {
        let corpus = tokenize(&["cat cat dog", "dog dog dog", "fish swim deep"]);
        let index = SparseIndex::build(&corpus);

        let once = index.scores(&query("cat"))[0];
        let twice = index.scores(&query("cat cat"))[0];
        assert!(once > 0.0);
        assert!((twice - 2.0 * once).abs() < 1e-9);
    }
}
