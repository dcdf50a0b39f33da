use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tracing::info;

use crate::chat::{ChatMessage, ChatService};
use crate::config::Config;
use crate::database::VectorStore;
use crate::ingest::{IngestionReport, Ingestor, SourceOutcome};

const SNIPPET_CHARS: usize = 100;

/// Start the HTTP server, optionally overriding the configured bind address
#[inline]
pub async fn serve(bind: Option<String>) -> Result<()> {
    let mut config = Config::load_default().context("Failed to load configuration")?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    println!(
        "Serving {} on http://{}",
        config.chatbot.name, config.server.bind
    );
    crate::server::serve(&config)
        .await
        .context("Server terminated with an error")
}

/// Scrape, chunk and embed `sources`, or the configured defaults when empty
#[inline]
pub async fn ingest(sources: Vec<String>) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let store = Arc::new(
        VectorStore::open(&config)
            .await
            .context("Failed to open vector store")?,
    );
    let ingestor = Ingestor::new(&config, store)?.with_progress(true);

    if sources.is_empty() {
        println!(
            "Ingesting {} configured sources...",
            ingestor.default_sources().len()
        );
    } else {
        println!("Ingesting {} sources...", sources.len());
    }

    let report = ingestor.run(Some(sources)).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestionReport) {
    println!();
    for entry in &report.sources {
        match &entry.outcome {
            SourceOutcome::Ingested {
                words,
                chunks_created,
                chunks_saved,
            } => println!(
                "{} {} ({} words, {}/{} chunks saved)",
                style("✓").green(),
                entry.source,
                words,
                chunks_saved,
                chunks_created
            ),
            SourceOutcome::ScrapeFailed => println!(
                "{} {} (no content could be scraped)",
                style("✗").red(),
                entry.source
            ),
            SourceOutcome::EmbeddingFailed { chunks_created } => println!(
                "{} {} (all {} chunks failed to embed)",
                style("✗").red(),
                entry.source,
                chunks_created
            ),
            SourceOutcome::InvalidSource(reason) => println!(
                "{} {} (invalid source: {})",
                style("✗").red(),
                entry.source,
                reason
            ),
        }
    }

    let failed = report.failed_sources().count();
    println!();
    println!("Summary:");
    println!("  Sources: {}", report.sources.len());
    println!("  Failed: {}", failed);
    println!("  Chunks Saved: {}", report.chunks_saved());
}

/// Print the chunk count and one sample chunk
#[inline]
pub async fn show_stats() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let store = VectorStore::open(&config)
        .await
        .context("Failed to open vector store")?;

    let total = store
        .count_chunks()
        .await
        .context("Failed to count chunks")?;

    println!("{}", style("📊 Knowledge Base").bold().cyan());
    println!("  Location: {}", config.vector_database_path().display());
    println!("  Embedding Dimension: {}", store.dimension());
    println!("  Total Chunks: {}", total);

    match store.sample_chunk().await.context("Failed to read sample")? {
        Some(chunk) => {
            println!("  Sample Source: {}", chunk.source_url);
            println!("  Sample Snippet: {}", chunk.snippet(SNIPPET_CHARS));
        }
        None => {
            println!("  No data found.");
            println!("  Use 'sitechat ingest' to populate the knowledge base.");
        }
    }

    Ok(())
}

/// Answer a single question from the command line
#[inline]
pub async fn ask(message: String) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let store = Arc::new(
        VectorStore::open(&config)
            .await
            .context("Failed to open vector store")?,
    );
    let service = ChatService::new(&config, store);

    info!("Answering one-off question");
    let answer = service
        .answer(&[ChatMessage::user(message)])
        .await
        .context("Failed to answer question")?;

    println!("{}", answer.response);
    println!();
    println!(
        "{} {}",
        style("Source:").dim(),
        style(answer.source.to_string()).dim()
    );
    Ok(())
}
