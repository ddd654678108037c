use clap::{Parser, Subcommand};
use scholarsdock::Result;
use scholarsdock::commands::{ask, chat, ingest_file, init_config, show_config, show_status};
use scholarsdock::config::get_data_dir;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scholarsdock")]
#[command(about = "Ask questions about your own documents with a local language model")]
#[command(version)]
struct Cli {
    /// Directory holding the configuration and the document index
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk and index a PDF, DOCX, TXT or Markdown file
    Ingest {
        /// Path of the file to index
        path: PathBuf,
        /// Name recorded as the chunks' source; its extension selects the format
        #[arg(long)]
        name: Option<String>,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Let the model add knowledge beyond the retrieved context
        #[arg(long)]
        open: bool,
    },
    /// Start an interactive conversation
    Chat {
        /// Start in open mode instead of strict mode
        #[arg(long)]
        open: bool,
    },
    /// Show index contents and backend health
    Status,
    /// Show or initialise the configuration
    Config {
        /// Show current configuration
        #[arg(long, conflicts_with = "init")]
        show: bool,
        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_data_dir()?,
    };

    match cli.command {
        Commands::Ingest { path, name } => {
            ingest_file(&data_dir, &path, name).await?;
        }
        Commands::Ask { question, open } => {
            ask(&data_dir, &question, open).await?;
        }
        Commands::Chat { open } => {
            chat(&data_dir, open).await?;
        }
        Commands::Status => {
            show_status(&data_dir).await?;
        }
        Commands::Config { init, .. } => {
            if init {
                init_config(&data_dir)?;
            } else {
                show_config(&data_dir)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn status_command() {
        let cli = Cli::try_parse_from(["scholarsdock", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
            assert_eq!(parsed.data_dir, None);
        }
    }

    #[test]
    fn ingest_command_with_name() {
        let cli = Cli::try_parse_from([
            "scholarsdock",
            "ingest",
            "/tmp/upload-3",
            "--name",
            "Thesis.PDF",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { path, name } = parsed.command {
                assert_eq!(path, PathBuf::from("/tmp/upload-3"));
                assert_eq!(name, Some("Thesis.PDF".to_string()));
            } else {
                panic!("expected ingest command");
            }
        }
    }

    #[test]
    fn ask_defaults_to_strict() {
        let cli = Cli::try_parse_from(["scholarsdock", "ask", "What is RAG?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, open } = parsed.command {
                assert_eq!(question, "What is RAG?");
                assert!(!open);
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn global_data_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["scholarsdock", "chat", "--open", "--data-dir", "/srv/dock"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.data_dir, Some(PathBuf::from("/srv/dock")));
            assert!(matches!(parsed.command, Commands::Chat { open: true }));
        }
    }

    #[test]
    fn config_flags_conflict() {
        let cli = Cli::try_parse_from(["scholarsdock", "config", "--show", "--init"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["scholarsdock", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["scholarsdock", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
