pub mod content_api;
pub mod extractor;


use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use self::content_api::ContentApiClient;
use self::extractor::extract_text;
use crate::config::Config;
use crate::http::{RetryPolicy, build_agent, call_with_retry};

/// Where a source's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(Url),
    File(PathBuf),
}

/// A single ingestion source. The key is the string exactly as supplied and is
/// what stored chunks are scoped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    key: String,
    location: SourceLocation,
}

impl Source {
    /// Strings starting with `http` are URLs; anything else is a local file path
    /// resolved relative to the working directory.
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(anyhow!("Source cannot be empty"));
        }

        let location = if key.starts_with("http") {
            SourceLocation::Url(validate_url(key)?)
        } else {
            SourceLocation::File(PathBuf::from(key))
        };

        Ok(Self {
            key: key.to_string(),
            location,
        })
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        matches!(self.location, SourceLocation::File(_))
    }
}

impl fmt::Display for Source {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Turns sources into plain text: local files are read as-is, web pages go
/// through ContentAPI when it is configured and fall back to a direct fetch.
#[derive(Debug, Clone)]
pub struct Scraper {
    agent: Agent,
    retry_policy: RetryPolicy,
    content_api: Option<ContentApiClient>,
}

impl Scraper {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let ingestion = &config.ingestion;
        let timeout = Duration::from_secs(ingestion.timeout_seconds);

        let content_api = ContentApiClient::from_config(&config.content_api, timeout)
            .context("Failed to configure ContentAPI client")?;
        if content_api.is_some() {
            debug!("ContentAPI extraction enabled");
        }

        Ok(Self {
            agent: build_agent(timeout, Some(&ingestion.user_agent)),
            retry_policy: RetryPolicy::new(
                ingestion.max_retries.saturating_add(1),
                Duration::from_secs(ingestion.retry_delay_seconds),
            ),
            content_api,
        })
    }

    /// Scrape a source without blocking the async runtime
    #[inline]
    pub async fn scrape(&self, source: &Source) -> Option<String> {
        let scraper = self.clone();
        let source = source.clone();
        let key = source.key().to_string();

        match tokio::task::spawn_blocking(move || scraper.scrape_blocking(&source)).await {
            Ok(text) => text,
            Err(e) => {
                error!("Scrape task for {} failed: {}", key, e);
                None
            }
        }
    }

    /// `None` when the source could not be read or produced no text
    #[inline]
    pub fn scrape_blocking(&self, source: &Source) -> Option<String> {
        info!("Scraping {}", source);

        let text = match source.location() {
            SourceLocation::File(path) => match std::fs::read_to_string(path) {
                Ok(content) => Some(content),
                Err(e) => {
                    error!("Failed to read local file {}: {}", path.display(), e);
                    None
                }
            },
            SourceLocation::Url(url) => self.scrape_url(url),
        };

        let text = text.filter(|t| !t.trim().is_empty());
        if text.is_none() {
            warn!("No text scraped from {}", source);
        }
        text
    }

    fn scrape_url(&self, url: &Url) -> Option<String> {
        if let Some(client) = &self.content_api {
            match client.extract(url) {
                Ok(Some(content)) => {
                    debug!("ContentAPI returned {} bytes for {}", content.len(), url);
                    return Some(content);
                }
                Ok(None) => warn!("ContentAPI returned no content for {}, fetching directly", url),
                Err(e) => warn!("ContentAPI failed for {}: {:#}, fetching directly", url, e),
            }
        }

        match self.fetch(url) {
            Ok(html) => Some(extract_text(&html)),
            Err(e) => {
                error!("Failed to fetch {}: {:#}", url, e);
                None
            }
        }
    }

    fn fetch(&self, url: &Url) -> Result<String> {
        let html = call_with_retry(url.as_str(), &self.retry_policy, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        debug!("Fetched {} bytes from {}", html.len(), url);
        Ok(html)
    }
}

/// Validate and parse a URL
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {}", url_str))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}
