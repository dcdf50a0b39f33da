#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::{Config, GeminiConfig, OpenRouterConfig, RetrievalConfig};
use crate::http::build_agent;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 sitechat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Model").bold().yellow());
    eprintln!("Chunks and queries are embedded with the Gemini embedding API.");
    eprintln!();
    configure_gemini(&mut config.gemini)?;

    eprintln!();
    eprintln!("{}", style("Answer Model").bold().yellow());
    eprintln!("Answers and web-search fallbacks are generated through OpenRouter.");
    eprintln!();
    configure_openrouter(&mut config.openrouter)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    config.web_search.enabled = Confirm::new()
        .with_prompt("Fall back to web search when no document matches?")
        .default(config.web_search.enabled)
        .interact()?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_openrouter_connection(&config.openrouter) {
        eprintln!("{}", style("✓ OpenRouter reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach OpenRouter").yellow()
        );
        eprintln!("You can continue, but chat requests will fail until it is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Server:").bold().yellow());
    eprintln!("  Bind: {}", style(&config.server.bind).cyan());

    eprintln!();
    eprintln!("{}", style("Embeddings (Gemini):").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.gemini.base_url).cyan());
    eprintln!("  Model: {}", style(&config.gemini.model).cyan());
    eprintln!(
        "  Dimension: {}",
        style(config.gemini.embedding_dimension).cyan()
    );
    eprintln!("  API Key: {}", style(mask_secret(&config.gemini.api_key)).cyan());

    eprintln!();
    eprintln!("{}", style("Completions (OpenRouter):").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.openrouter.base_url).cyan());
    eprintln!("  Model: {}", style(&config.openrouter.model).cyan());
    eprintln!(
        "  API Key: {}",
        style(mask_secret(&config.openrouter.api_key)).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Limit: {}", style(config.retrieval.limit).cyan());
    eprintln!(
        "  Score Threshold: {}",
        style(config.retrieval.score_threshold).cyan()
    );
    eprintln!(
        "  History Turns: {}",
        style(config.retrieval.history_turns).cyan()
    );
    eprintln!(
        "  Web Search: {} ({})",
        style(if config.web_search_available() {
            "available"
        } else {
            "unavailable"
        })
        .cyan(),
        config.web_search.model
    );

    eprintln!();
    eprintln!("{}", style("Ingestion:").bold().yellow());
    eprintln!("  Words per Chunk: {}", style(config.ingestion.max_words).cyan());
    eprintln!(
        "  ContentAPI Key: {}",
        style(mask_secret(&config.content_api.api_key)).cyan()
    );
    for source in &config.ingestion.sources {
        eprintln!("  Source: {}", style(source).cyan());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Show only the first four characters of a secret
#[inline]
pub fn mask_secret(secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return "(not set)".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{}****", prefix)
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().or_else(|_| {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        let dir = Config::config_dir().context("Failed to resolve configuration directory")?;
        Ok(Config::with_base_dir(dir))
    })
}

fn configure_gemini(gemini: &mut GeminiConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(gemini.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(gemini.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let api_key = Password::new()
        .with_prompt("Gemini API key (leave empty to use GEMINI_API_KEY)")
        .allow_empty_password(true)
        .interact()?;

    gemini.set_model(model)?;
    gemini.set_embedding_dimension(dimension)?;
    if !api_key.trim().is_empty() {
        gemini.api_key = api_key.trim().to_string();
    }

    Ok(())
}

fn configure_openrouter(openrouter: &mut OpenRouterConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Answer model")
        .default(openrouter.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let api_key = Password::new()
        .with_prompt("OpenRouter API key (leave empty to use OPENROUTER_API_KEY)")
        .allow_empty_password(true)
        .interact()?;

    openrouter.set_model(model)?;
    if !api_key.trim().is_empty() {
        openrouter.api_key = api_key.trim().to_string();
    }

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let threshold: f32 = Input::new()
        .with_prompt("Minimum similarity score for document context")
        .default(retrieval.score_threshold)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (-1.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err("Threshold must be between -1.0 and 1.0")
            }
        })
        .interact_text()?;

    retrieval.set_score_threshold(threshold)?;
    Ok(())
}

fn test_openrouter_connection(openrouter: &OpenRouterConfig) -> bool {
    let url = format!("{}/models", openrouter.base_url.trim_end_matches('/'));
    let agent = build_agent(std::time::Duration::from_secs(5), None);

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
