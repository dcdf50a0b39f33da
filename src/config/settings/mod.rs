#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const CONTENT_API_KEY_ENV: &str = "CONTENT_API_KEY";

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are Grow AI Chatbot, representing Growlity (a sustainability and ESG consulting company).

Rules:
1. Maintain the identity of "Grow AI Chatbot".
2. Tone: Professional and helpful. Executive-level clarity.
3. No emojis.
4. Answer general knowledge questions as well as questions about ESG or Growlity services.
5. If a user asks for specific Growlity company data that is not in your context, state you don't have that exact figure but do not invent facts about the company.
6. Never mention embeddings, scraping, vector search, databases, or backend logic.
7. Keep answers concise and of medium length unless the user explicitly asks for depth.
8. Do not expose technical system details.
9. Prefer structured answers with bullet points.
10. Be lenient with typographical errors and answer the semantic intent of the query."#;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub content_api: ContentApiConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub chatbot: ChatbotConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
    #[serde(skip)]
    pub(crate) env_secrets: EnvSecrets,
}

/// API keys replaced from the environment, remembered so `save` never
/// writes them to disk
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EnvSecrets {
    gemini: Option<OverriddenKey>,
    openrouter: Option<OverriddenKey>,
    content_api: Option<OverriddenKey>,
}

#[derive(Debug, Clone, PartialEq)]
struct OverriddenKey {
    env: String,
    file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Hosted embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub model: String,
    pub embedding_dimension: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-embedding-001".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
            retry_attempts: 1,
        }
    }
}

/// Chat completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "google/gemini-2.0-flash-lite-001".to_string(),
            timeout_seconds: 60,
            retry_attempts: 1,
        }
    }
}

/// Rendered-page extraction service used before falling back to a plain fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContentApiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub render_js: bool,
}

impl Default for ContentApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.getcontentapi.com/api/v1".to_string(),
            api_key: String::new(),
            render_js: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest chunks requested from the vector store
    pub limit: usize,
    /// Cosine similarity a chunk must exceed to be used as context
    pub score_threshold: f32,
    /// Prior conversation turns included in the prompt
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            score_threshold: 0.5,
            history_turns: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebSearchConfig {
    pub enabled: bool,
    pub model: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-oss-120b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestionConfig {
    pub max_words: usize,
    pub sources: Vec<String>,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_words: 600,
            sources: vec![
                "https://growlity.com".to_string(),
                "https://growlity.com/our-team".to_string(),
                "https://growlity.com/solutions".to_string(),
                "https://growlity.com/contact-us".to_string(),
                "company-info.txt".to_string(),
            ],
            user_agent: concat!("sitechat/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_seconds: 30,
            max_retries: 0,
            retry_delay_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatbotConfig {
    pub name: String,
    pub system_prompt: String,
    pub fallback_response: String,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            name: "Grow AI Chatbot".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_response: "I'm sorry, I couldn't generate a response.".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL for {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),
    #[error("Invalid model name for {0} (cannot be empty)")]
    InvalidModel(&'static str),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} seconds (must be between 1 and 600)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be at least 1)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid retrieval limit: {0} (must be between 1 and 100)")]
    InvalidRetrievalLimit(usize),
    #[error("Invalid score threshold: {0} (must be between -1.0 and 1.0)")]
    InvalidScoreThreshold(f32),
    #[error("Invalid max words per chunk: {0} (must be between 1 and 10000)")]
    InvalidMaxWords(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration rooted at `base_dir`
    #[inline]
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// `~/.sitechat`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".sitechat"))
            .or_else(|| dirs::data_dir().map(|data| data.join("sitechat")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the default configuration directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let dir = Self::config_dir().context("Failed to resolve configuration directory")?;
        Self::load(dir)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };

        config.base_dir = config_dir.as_ref().to_path_buf();
        config.apply_env_overrides();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Secrets in the environment win over the config file
    #[inline]
    pub fn apply_env_overrides(&mut self) {
        override_key(
            &mut self.gemini.api_key,
            &mut self.env_secrets.gemini,
            GEMINI_API_KEY_ENV,
        );
        override_key(
            &mut self.openrouter.api_key,
            &mut self.env_secrets.openrouter,
            OPENROUTER_API_KEY_ENV,
        );
        override_key(
            &mut self.content_api.api_key,
            &mut self.env_secrets.content_api,
            CONTENT_API_KEY_ENV,
        );
    }

    /// The configuration as it belongs on disk: keys still holding their
    /// environment value fall back to what the file had
    fn without_env_secrets(&self) -> Self {
        let mut config = self.clone();
        restore_key(&mut config.gemini.api_key, self.env_secrets.gemini.as_ref());
        restore_key(
            &mut config.openrouter.api_key,
            self.env_secrets.openrouter.as_ref(),
        );
        restore_key(
            &mut config.content_api.api_key,
            self.env_secrets.content_api.as_ref(),
        );
        config
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(&self.without_env_secrets())
            .context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind.clone()))?;
        self.gemini.validate()?;
        self.openrouter.validate()?;
        validate_base_url("content_api", &self.content_api.base_url)?;
        self.retrieval.validate()?;
        if self.web_search.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("web_search"));
        }
        self.ingestion.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the LanceDB chunk table
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    /// Web search needs both the switch and a completion key
    #[inline]
    pub fn web_search_available(&self) -> bool {
        self.web_search.enabled && !self.openrouter.api_key.trim().is_empty()
    }
}

impl GeminiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url("gemini", &self.base_url)?;
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("gemini"));
        }
        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }
        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("gemini"));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl OpenRouterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url("openrouter", &self.base_url)?;
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("openrouter"));
        }
        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("openrouter"));
        }
        self.model = model;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.limit) {
            return Err(ConfigError::InvalidRetrievalLimit(self.limit));
        }
        if !(-1.0..=1.0).contains(&self.score_threshold) {
            return Err(ConfigError::InvalidScoreThreshold(self.score_threshold));
        }
        Ok(())
    }

    pub fn set_score_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidScoreThreshold(threshold));
        }
        self.score_threshold = threshold;
        Ok(())
    }
}

impl IngestionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10_000).contains(&self.max_words) {
            return Err(ConfigError::InvalidMaxWords(self.max_words));
        }
        validate_timeout(self.timeout_seconds)
    }
}

fn validate_base_url(section: &'static str, base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url)
        .map_err(|_| ConfigError::InvalidUrl(section, base_url.to_string()))?;
    if (url.scheme() != "http" && url.scheme() != "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(section, base_url.to_string()));
    }
    Ok(())
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if (1..=600).contains(&seconds) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTimeout(seconds))
    }
}

fn validate_retry_attempts(attempts: u32) -> Result<(), ConfigError> {
    if attempts == 0 {
        Err(ConfigError::InvalidRetryAttempts(attempts))
    } else {
        Ok(())
    }
}

fn override_key(key: &mut String, slot: &mut Option<OverriddenKey>, env_name: &str) {
    if let Some(env) = non_empty_env(env_name) {
        let replaced = std::mem::replace(key, env.clone());
        let file = slot.take().map_or(replaced, |previous| previous.file);
        *slot = Some(OverriddenKey { env, file });
    }
}

fn restore_key(key: &mut String, overridden: Option<&OverriddenKey>) {
    if let Some(overridden) = overridden.filter(|o| *key == o.env) {
        key.clone_from(&overridden.file);
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
