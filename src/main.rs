use clap::{Parser, Subcommand};
use sitechat::Result;
use sitechat::commands::{ask, ingest, serve, show_stats};
use sitechat::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "sitechat")]
#[command(about = "A retrieval-augmented chatbot over your company's website")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure API keys, models and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start the chat HTTP server
    Serve {
        /// Address to listen on, e.g. "0.0.0.0:3000"
        #[arg(long)]
        bind: Option<String>,
    },
    /// Scrape and embed sources into the knowledge base
    Ingest {
        /// URLs or local text files; the configured sources are used when omitted
        sources: Vec<String>,
    },
    /// Show what the knowledge base contains
    Stats,
    /// Ask a single question and print the answer
    Ask {
        /// The question to answer
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Serve { bind } => {
            serve(bind).await?;
        }
        Commands::Ingest { sources } => {
            ingest(sources).await?;
        }
        Commands::Stats => {
            show_stats().await?;
        }
        Commands::Ask { message } => {
            ask(message).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["sitechat", "stats"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Stats));
        }
    }

    #[test]
    fn serve_command_defaults_bind() {
        let cli = Cli::try_parse_from(["sitechat", "serve"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Serve { bind } = parsed.command {
                assert_eq!(bind, None);
            }
        }
    }

    #[test]
    fn serve_command_with_bind() {
        let cli = Cli::try_parse_from(["sitechat", "serve", "--bind", "0.0.0.0:8080"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Serve { bind } = parsed.command {
                assert_eq!(bind, Some("0.0.0.0:8080".to_string()));
            }
        }
    }

    #[test]
    fn ingest_without_sources() {
        let cli = Cli::try_parse_from(["sitechat", "ingest"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { sources } = parsed.command {
                assert!(sources.is_empty());
            }
        }
    }

    #[test]
    fn ingest_with_sources() {
        let cli = Cli::try_parse_from([
            "sitechat",
            "ingest",
            "https://growlity.com/about",
            "company-info.txt",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { sources } = parsed.command {
                assert_eq!(
                    sources,
                    vec![
                        "https://growlity.com/about".to_string(),
                        "company-info.txt".to_string()
                    ]
                );
            }
        }
    }

    #[test]
    fn ask_requires_message() {
        let cli = Cli::try_parse_from(["sitechat", "ask"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn ask_with_message() {
        let cli = Cli::try_parse_from(["sitechat", "ask", "What does Growlity do?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { message } = parsed.command {
                assert_eq!(message, "What does Growlity do?");
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["sitechat", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["sitechat", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["sitechat", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
