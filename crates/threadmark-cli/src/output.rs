//! Result formatting for terminal and JSON output.

use anyhow::Result;
use serde_json::json;
use threadmark_core::retrieval::ScoredChunk;

/// Maximum passage characters shown per result in human output.
const PREVIEW_LEN: usize = 300;

/// Formats results for reading in a terminal.
pub fn format_human(query: &str, results: &[ScoredChunk]) -> String {
    if results.is_empty() {
        return format!("No results for \"{}\"", query);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} result(s) for \"{}\"\n",
        results.len(),
        query
    ));
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. [{:.3}] ({})\n",
            i + 1,
            result.score,
            result.doc_id
        ));
        out.push_str(&format!("   {}\n", preview(&result.text)));
    }
    out
}

/// Formats results as a JSON document.
pub fn format_json(query: &str, results: &[ScoredChunk]) -> Result<String> {
    let entries: Vec<_> = results
        .iter()
        .map(|r| {
            json!({
                "text": r.text,
                "score": r.score,
                "doc_id": r.doc_id.as_str(),
            })
        })
        .collect();

    Ok(serde_json::to_string_pretty(&json!({
        "query": query,
        "results": entries,
    }))?)
}

/// Truncates a passage on a character boundary for display.
fn preview(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= PREVIEW_LEN {
        return flattened;
    }
    let truncated: String = flattened.chars().take(PREVIEW_LEN).collect();
    format!("{}...", truncated)
}
