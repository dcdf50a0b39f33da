// Configuration management: TOML settings, env-var secrets, interactive setup

pub mod interactive;
pub mod settings;


pub use interactive::{mask_secret, run_interactive_config, show_config};
pub use settings::{
    ChatbotConfig, Config, ConfigError, ContentApiConfig, GeminiConfig, IngestionConfig,
    OpenRouterConfig, RetrievalConfig, ServerConfig, WebSearchConfig,
};
