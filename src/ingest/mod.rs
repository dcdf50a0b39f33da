// Scrape -> chunk -> embed -> store, one source at a time


use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crawler::{Scraper, Source};
use crate::database::{ChunkRecord, VectorStore};
use crate::embeddings::{ChunkingConfig, GeminiEmbedder, word_count};
use crate::{Result, SiteChatError};

/// What happened to one source during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Ingested {
        words: usize,
        chunks_created: usize,
        chunks_saved: usize,
    },
    /// Nothing could be scraped; stored chunks were left untouched
    ScrapeFailed,
    /// Every chunk failed to embed; stored chunks were left untouched
    EmbeddingFailed { chunks_created: usize },
    InvalidSource(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub sources: Vec<SourceReport>,
}

impl IngestionReport {
    #[inline]
    pub fn chunks_saved(&self) -> usize {
        self.sources
            .iter()
            .map(|report| match report.outcome {
                SourceOutcome::Ingested { chunks_saved, .. } => chunks_saved,
                _ => 0,
            })
            .sum()
    }

    /// Sources that did not produce any stored chunks
    #[inline]
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|report| !matches!(report.outcome, SourceOutcome::Ingested { .. }))
    }
}

/// Runs the ingestion pipeline over a list of sources
pub struct Ingestor {
    scraper: Scraper,
    embedder: GeminiEmbedder,
    store: Arc<VectorStore>,
    chunking: ChunkingConfig,
    default_sources: Vec<String>,
    show_progress: bool,
}

impl Ingestor {
    #[inline]
    pub fn new(config: &Config, store: Arc<VectorStore>) -> Result<Self> {
        let scraper = Scraper::new(config)
            .map_err(|e| SiteChatError::Crawler(format!("Failed to create scraper: {:#}", e)))?;

        Ok(Self {
            scraper,
            embedder: GeminiEmbedder::new(&config.gemini),
            store,
            chunking: ChunkingConfig::from(&config.ingestion),
            default_sources: config.ingestion.sources.clone(),
            show_progress: false,
        })
    }

    /// Show a progress bar on an attended terminal
    #[inline]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[inline]
    pub fn default_sources(&self) -> &[String] {
        &self.default_sources
    }

    /// Ingest `sources`, or the configured defaults when `None` or empty.
    /// Store failures abort the run; scrape and embedding failures are
    /// reported per source.
    #[inline]
    pub async fn run(&self, sources: Option<Vec<String>>) -> Result<IngestionReport> {
        if !self.embedder.has_api_key() {
            return Err(SiteChatError::Embedding(
                "Gemini API key is not configured".to_string(),
            ));
        }

        let sources = match sources {
            Some(sources) if !sources.is_empty() => sources,
            _ => self.default_sources.clone(),
        };

        info!("Starting ingestion of {} sources", sources.len());
        let bar = self.progress_bar(sources.len());

        let mut report = IngestionReport::default();
        for raw in &sources {
            bar.set_message(raw.clone());

            let outcome = match Source::parse(raw) {
                Ok(source) => self.ingest_source(&source).await?,
                Err(e) => {
                    error!("Skipping invalid source {}: {:#}", raw, e);
                    SourceOutcome::InvalidSource(format!("{:#}", e))
                }
            };

            report.sources.push(SourceReport {
                source: raw.trim().to_string(),
                outcome,
            });
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "Ingestion complete: {} chunks saved from {} sources ({} failed)",
            report.chunks_saved(),
            report.sources.len(),
            report.failed_sources().count()
        );
        Ok(report)
    }

    async fn ingest_source(&self, source: &Source) -> Result<SourceOutcome> {
        let Some(text) = self.scraper.scrape(source).await else {
            warn!("Scrape failed for {}, keeping existing chunks", source);
            return Ok(SourceOutcome::ScrapeFailed);
        };

        let words = word_count(&text);
        let chunks = self.chunking.chunk(&text);
        info!(
            "Scraped {} words from {}, {} chunks",
            words,
            source,
            chunks.len()
        );

        let chunks_created = chunks.len();
        let mut records = Vec::with_capacity(chunks_created);
        for (index, chunk) in chunks.into_iter().enumerate() {
            match self.embedder.embed(&chunk).await {
                Ok(vector) => {
                    debug!("Embedded chunk {} of {}", index, source);
                    let chunk_index = u32::try_from(index).unwrap_or(u32::MAX);
                    records.push(ChunkRecord::new(source.key(), chunk_index, chunk, vector));
                }
                Err(e) => warn!("Skipping chunk {} of {}: {}", index, source, e),
            }
        }

        if records.is_empty() && chunks_created > 0 {
            error!(
                "No chunks of {} could be embedded, keeping existing chunks",
                source
            );
            return Ok(SourceOutcome::EmbeddingFailed { chunks_created });
        }

        let chunks_saved = self
            .store
            .replace_source_chunks(source.key(), &records)
            .await?;

        Ok(SourceOutcome::Ingested {
            words,
            chunks_created,
            chunks_saved,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress || !console::user_attended_stderr() {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}") {
            bar.set_style(style);
        }
        bar
    }
}
