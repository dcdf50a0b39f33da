
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::extractor::collapse_whitespace;
use crate::config::ContentApiConfig;
use crate::http::{RetryPolicy, build_agent, call_with_retry};

/// Client for a hosted extraction service that renders JavaScript-heavy pages
/// and returns their readable text.
#[derive(Debug, Clone)]
pub struct ContentApiClient {
    agent: ureq::Agent,
    endpoint: Url,
    api_key: String,
    render_js: bool,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    content: Option<String>,
}

impl ContentApiClient {
    /// `None` when no API key is configured
    #[inline]
    pub fn from_config(config: &ContentApiConfig, timeout: Duration) -> Result<Option<Self>> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Ok(None);
        }

        let endpoint = Url::parse(&format!(
            "{}/web/extract",
            config.base_url.trim_end_matches('/')
        ))
        .with_context(|| format!("Invalid ContentAPI base URL: {}", config.base_url))?;

        Ok(Some(Self {
            agent: build_agent(timeout, None),
            endpoint,
            api_key: api_key.to_string(),
            render_js: config.render_js,
        }))
    }

    /// Extract the text of `page`. `Ok(None)` means the service answered
    /// without any content.
    #[inline]
    pub fn extract(&self, page: &Url) -> Result<Option<String>> {
        let url = self.request_url(page);
        debug!("Requesting ContentAPI extraction for {}", page);

        let auth = format!("Bearer {}", self.api_key);
        let body = call_with_retry(url.as_str(), &RetryPolicy::once(), || {
            self.agent
                .get(url.as_str())
                .header("Authorization", auth.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .with_context(|| format!("ContentAPI request failed for {}", page))?;

        let response: ExtractResponse =
            serde_json::from_str(&body).context("Failed to parse ContentAPI response")?;

        Ok(response
            .content
            .map(|content| collapse_whitespace(&content))
            .filter(|content| !content.is_empty()))
    }

    fn request_url(&self, page: &Url) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("url", page.as_str())
            .append_pair("render_js", if self.render_js { "true" } else { "false" });
        url
    }
}
