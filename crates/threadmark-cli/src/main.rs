//! Threadmark CLI - session-scoped hybrid retrieval from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a document into a session
//! tm ingest notes.txt --session chat-1
//!
//! # Query a session
//! tm query "how do glaciers move" --session chat-1 -n 5
//! tm query "glaciers" --session chat-1 --json
//!
//! # Remove a document, or a whole session
//! tm remove --session chat-1 --doc notes
//! tm remove --session chat-1
//! ```

mod config;
mod engine;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use threadmark_core::storage::{DocId, SessionId};
use tracing_subscriber::EnvFilter;

/// Threadmark hybrid retrieval CLI.
///
/// Ingests documents into per-session collections and retrieves the most
/// relevant passages for a query by fusing token-level dense similarity
/// with BM25 lexical scoring.
#[derive(Parser)]
#[command(name = "tm", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Custom data directory (default: platform standard location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a text file into a session
    Ingest {
        /// Path to the text file
        file: PathBuf,
        /// Session the document belongs to
        #[arg(long)]
        session: String,
        /// Document id (default: the file stem)
        #[arg(long)]
        doc: Option<String>,
    },
    /// Query a session for relevant passages
    Query {
        /// Query text
        query: String,
        /// Session to search
        #[arg(long)]
        session: String,
        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = threadmark_core::config::DEFAULT_TOP_K)]
        limit: usize,
        /// Restrict candidates by topic before scoring
        #[arg(long)]
        topics: bool,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a session, or one document within it
    Remove {
        /// Session to remove from
        #[arg(long)]
        session: String,
        /// Document id; omit to remove the whole session
        #[arg(long)]
        doc: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let retriever = engine::open_retriever(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Ingest { file, session, doc } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc_id = doc.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string())
            });

            let report = retriever
                .ingest(&SessionId::new(session), &DocId::new(doc_id), &text)
                .await?;
            println!(
                "Indexed {} chunks ({} skipped)",
                report.chunks_indexed, report.chunks_skipped
            );
        }
        Command::Query {
            query,
            session,
            limit,
            topics,
            json,
        } => {
            let session = SessionId::new(session);
            let results = if topics {
                retriever.query_topics(&session, &query, limit).await?
            } else {
                retriever.query(&session, &query, limit).await?
            };

            let rendered = if json {
                output::format_json(&query, &results)?
            } else {
                output::format_human(&query, &results)
            };
            println!("{}", rendered);
        }
        Command::Remove { session, doc } => {
            let doc_id = doc.map(DocId::new);
            let summary = retriever
                .remove(&SessionId::new(session), doc_id.as_ref())
                .await?;
            println!("Removed {} chunks", summary.deleted_chunks);
        }
    }

    Ok(())
}
