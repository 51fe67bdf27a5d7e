//! Topic selection for the topic-filtered retrieval path.

use crate::storage::TopicRecord;
use std::collections::HashSet;

/// Lowercased alphanumeric terms of a text span, for keyword matching.
pub(crate) fn query_terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Picks the topic whose keywords best overlap the query terms.
///
/// Overlap is counted as keyword set membership, case-insensitive. Returns
/// the best topic with its overlap count; the caller falls back to
/// full-corpus retrieval when the count is zero (or no topics exist).
pub(crate) fn select_topic<'a>(
    topics: &'a [TopicRecord],
    terms: &HashSet<String>,
) -> Option<(&'a TopicRecord, usize)> {
    topics
        .iter()
        .map(|topic| {
            let overlap = topic
                .keywords
                .iter()
                .filter(|k| terms.contains(&k.to_lowercase()))
                .count();
            (topic, overlap)
        })
        .max_by_key(|(_, overlap)| *overlap)
}
