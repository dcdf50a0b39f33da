use super::*;
use serial_test::serial;
use tempfile::TempDir;

fn clear_key_env() {
    // SAFETY: tests touching the environment are serialized
    unsafe {
        std::env::remove_var(GEMINI_API_KEY_ENV);
        std::env::remove_var(OPENROUTER_API_KEY_ENV);
        std::env::remove_var(CONTENT_API_KEY_ENV);
    }
}

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.retrieval.limit, 5);
    assert!((config.retrieval.score_threshold - 0.5).abs() < f32::EPSILON);
    assert_eq!(config.ingestion.max_words, 600);
    assert_eq!(config.gemini.embedding_dimension, DEFAULT_EMBEDDING_DIMENSION);
    assert_eq!(config.web_search.model, "gpt-oss-120b");
}

#[test]
fn partial_toml_fills_defaults() {
    let config: Config = toml::from_str(
        r#"
            [retrieval]
            score_threshold = 0.65

            [chatbot]
            name = "Acme Assistant"
        "#,
    )
    .expect("partial config should parse");

    assert!((config.retrieval.score_threshold - 0.65).abs() < f32::EPSILON);
    assert_eq!(config.retrieval.limit, 5);
    assert_eq!(config.chatbot.name, "Acme Assistant");
    assert_eq!(
        config.chatbot.fallback_response,
        ChatbotConfig::default().fallback_response
    );
    assert_eq!(config.gemini, GeminiConfig::default());
}

#[test]
fn invalid_values_are_rejected() {
    let mut config = Config::default();
    config.gemini.embedding_dimension = 8;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(8))
    ));

    let mut config = Config::default();
    config.retrieval.limit = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetrievalLimit(0))
    ));

    let mut config = Config::default();
    config.openrouter.base_url = "ftp://openrouter.ai".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidUrl("openrouter", _))
    ));

    let mut config = Config::default();
    config.server.bind = "localhost".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBindAddress(_))
    ));

    let mut config = Config::default();
    config.ingestion.max_words = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidMaxWords(0))
    ));

    let mut config = Config::default();
    config.gemini.retry_attempts = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetryAttempts(0))
    ));
}

#[test]
fn setters_validate_input() {
    let mut gemini = GeminiConfig::default();
    assert!(gemini.set_model("   ".to_string()).is_err());
    assert!(gemini.set_embedding_dimension(5000).is_err());
    assert!(gemini.set_embedding_dimension(1536).is_ok());
    assert_eq!(gemini.embedding_dimension, 1536);

    let mut retrieval = RetrievalConfig::default();
    assert!(retrieval.set_score_threshold(1.5).is_err());
    assert!(retrieval.set_score_threshold(0.7).is_ok());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_key_env();
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.server, ServerConfig::default());
    assert!(config.gemini.api_key.is_empty());
    assert!(!config.web_search_available());
}

#[test]
#[serial]
fn save_then_load_round_trip() {
    clear_key_env();
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::with_base_dir(temp_dir.path());
    config.retrieval.limit = 8;
    config.ingestion.sources = vec!["https://example.com/about".to_string()];
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn env_keys_override_file() {
    clear_key_env();
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        r#"
            [openrouter]
            api_key = "from-file"
        "#,
    )
    .expect("should write config");

    // SAFETY: tests touching the environment are serialized
    unsafe {
        std::env::set_var(OPENROUTER_API_KEY_ENV, "from-env");
        std::env::set_var(GEMINI_API_KEY_ENV, "   ");
    }

    let config = Config::load(temp_dir.path()).expect("should load config");
    clear_key_env();

    assert_eq!(config.openrouter.api_key, "from-env");
    assert!(config.gemini.api_key.is_empty());
    assert!(config.web_search_available());
}

#[test]
#[serial]
fn invalid_file_fails_to_load() {
    clear_key_env();
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        r#"
            [retrieval]
            limit = 500
        "#,
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn api_keys_are_not_serialized_when_empty() {
    let content = toml::to_string_pretty(&Config::default()).expect("should serialize");
    assert!(!content.contains("api_key"));
}

#[test]
#[serial]
fn save_does_not_persist_env_keys() {
    clear_key_env();
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        r#"
            [openrouter]
            api_key = "router-from-file"
        "#,
    )
    .expect("should write config");

    // SAFETY: tests touching the environment are serialized
    unsafe {
        std::env::set_var(GEMINI_API_KEY_ENV, "gemini-from-env");
        std::env::set_var(OPENROUTER_API_KEY_ENV, "router-from-env");
    }
    let config = Config::load(temp_dir.path()).expect("should load config");
    clear_key_env();

    assert_eq!(config.gemini.api_key, "gemini-from-env");
    config.save().expect("should save config");

    let content =
        std::fs::read_to_string(config.config_file_path()).expect("should read config");
    assert!(!content.contains("gemini-from-env"));
    assert!(!content.contains("router-from-env"));
    assert!(content.contains("router-from-file"));
}

#[test]
#[serial]
fn save_persists_keys_typed_over_env() {
    clear_key_env();
    let temp_dir = TempDir::new().expect("should create temp dir");

    // SAFETY: tests touching the environment are serialized
    unsafe {
        std::env::set_var(GEMINI_API_KEY_ENV, "gemini-from-env");
    }
    let mut config = Config::load(temp_dir.path()).expect("should load config");
    clear_key_env();

    config.gemini.api_key = "typed-key".to_string();
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded.gemini.api_key, "typed-key");
}
