use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Config, EmbeddingProvider};
use crate::embeddings::OllamaEmbedder;
use crate::engine::{Engine, QueryResponse, StartupState};
use crate::generation::{ChatMessage, OllamaChatClient};

/// Load the configuration stored in `data_dir`, or defaults when there is none
#[inline]
pub fn load_config(data_dir: &Path) -> Result<Config> {
    Config::load(data_dir)
        .with_context(|| format!("Failed to load configuration from {}", data_dir.display()))
}

fn open_engine(data_dir: &Path) -> Result<Engine> {
    let config = load_config(data_dir)?;
    Engine::init(config).context("Failed to open the document index")
}

fn spinner(message: &str) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Add a document to the index
#[inline]
pub async fn ingest_file(data_dir: &Path, file: &Path, name: Option<String>) -> Result<()> {
    if !file.is_file() {
        bail!("{} is not a readable file", file.display());
    }

    let display_name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("File path has no file name; pass --name")?,
    };

    let engine = open_engine(data_dir)?;
    let bar = spinner(&format!("Indexing {}", display_name));
    let result = engine.try_ingest(file, &display_name).await;
    bar.finish_and_clear();

    match result {
        Ok(report) => {
            println!(
                "{} Indexed {} chunks from {}",
                style("✓").green(),
                style(report.chunks).cyan(),
                style(&report.source).bold()
            );
            println!("  Index now holds {} chunks", report.total_chunks);
        }
        Err(e) => {
            println!("{}", style("Could not extract text.").red());
            println!("  {}", style(e).dim());
        }
    }

    Ok(())
}

/// Answer a single question
#[inline]
pub async fn ask(data_dir: &Path, question: &str, open: bool) -> Result<()> {
    let engine = open_engine(data_dir)?;

    let bar = spinner("Thinking...");
    let response = engine.query(question, &[], !open).await;
    bar.finish_and_clear();

    print_response(&response);
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.response);

    if response.sources.is_empty() {
        return;
    }

    println!();
    println!("{}", style("Sources:").bold().yellow());
    for (i, source) in response.sources.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            style(&source.source).cyan(),
            style(format!("(score {:.4})", source.score)).dim()
        );
        debug!("Source {} text: {}", i + 1, source.text);
    }
}

/// Interactive conversation over the indexed documents
#[inline]
pub async fn chat(data_dir: &Path, open: bool) -> Result<()> {
    let engine = open_engine(data_dir)?;
    let mut strict = !open;
    let mut history: Vec<ChatMessage> = Vec::new();

    eprintln!("{}", style("💬 Chat with your documents").bold().cyan());
    eprintln!(
        "{}",
        style("Commands: /reset, /strict, /open, /quit. Ctrl-C cancels an answer.").dim()
    );
    eprintln!("Mode: {}", mode_label(strict));
    eprintln!();

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                history.clear();
                eprintln!("{}", style("History cleared.").green());
                continue;
            }
            "/strict" => {
                strict = true;
                eprintln!("Mode: {}", mode_label(strict));
                continue;
            }
            "/open" => {
                strict = false;
                eprintln!("Mode: {}", mode_label(strict));
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let bar = spinner("Thinking...");
        let result = engine.try_query(line, &history, strict, &cancel).await;
        bar.finish_and_clear();
        watcher.abort();

        match result {
            Ok(response) => {
                print_response(&response);
                history.push(ChatMessage::user(line));
                history.push(ChatMessage::assistant(response.response));
            }
            Err(e) => {
                warn!("Chat query failed: {}", e);
                eprintln!("{}", style(e).red());
            }
        }
        println!();
    }

    Ok(())
}

fn mode_label(strict: bool) -> console::StyledObject<&'static str> {
    if strict {
        style("strict (answers only from your documents)").green()
    } else {
        style("open (documents plus general knowledge)").yellow()
    }
}

/// Report index and backend state
#[inline]
pub async fn show_status(data_dir: &Path) -> Result<()> {
    let config = load_config(data_dir)?;

    println!("📊 ScholarsDock Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Index Status:");
    match Engine::init(config.clone()) {
        Ok(engine) => {
            match engine.startup_state() {
                StartupState::Fresh => println!("   ✅ No documents indexed yet"),
                StartupState::Loaded { .. } => println!("   ✅ Index loaded"),
                StartupState::Recovered { path, reason } => {
                    println!(
                        "   ⚠️  Index was unreadable and has been reset: {} ({})",
                        path.display(),
                        reason
                    );
                }
            }
            println!("   📁 Location: {}", engine.index_dir().display());
            println!("   🔢 Dimension: {}", engine.dimension());
            println!("   🧩 Chunks: {}", engine.count().await);

            let sources = engine.sources().await;
            if !sources.is_empty() {
                println!();
                println!("📚 Documents ({} total):", sources.len());
                for summary in sources {
                    println!("   {} ({} chunks)", summary.source, summary.chunks);
                }
            }
        }
        Err(e) => println!("   ❌ Failed to open index - {}", e),
    }

    println!();
    println!("🤖 Ollama Status:");
    let checks = tokio::task::spawn_blocking(move || check_backends(&config))
        .await
        .context("Backend health check task failed")?;
    for line in checks {
        println!("   {}", line);
    }

    Ok(())
}

fn check_backends(config: &Config) -> Vec<String> {
    let mut lines = Vec::new();

    match config.embedding.provider {
        EmbeddingProvider::Hashing => {
            lines.push("✅ Embeddings: offline hashing (no model needed)".to_string());
        }
        EmbeddingProvider::Ollama => match OllamaEmbedder::new(config) {
            Ok(embedder) => match embedder.with_retry_attempts(1).health_check() {
                Ok(()) => lines.push(format!(
                    "✅ Embedding model: {}",
                    config.embedding.model
                )),
                Err(e) => lines.push(format!("⚠️  Embedding model unavailable - {}", e)),
            },
            Err(e) => lines.push(format!("❌ Embedding backend misconfigured - {}", e)),
        },
    }

    match OllamaChatClient::new(config) {
        Ok(client) => match client.health_check() {
            Ok(()) => lines.push(format!("✅ Chat model: {}", config.generation.model)),
            Err(e) => lines.push(format!("⚠️  Chat model unavailable - {}", e)),
        },
        Err(e) => lines.push(format!("❌ Chat backend misconfigured - {}", e)),
    }

    lines
}

/// Print the effective configuration
#[inline]
pub fn show_config(data_dir: &Path) -> Result<()> {
    let config = load_config(data_dir)?;

    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Ollama:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => println!("  URL: {}", style(url).cyan()),
        Err(e) => println!("  URL: {} ({})", style("Invalid").red(), e),
    }

    println!("{}", style("Embedding:").bold().yellow());
    println!("  Provider: {}", style(format!("{:?}", config.embedding.provider)).cyan());
    println!("  Model: {}", style(&config.embedding.model).cyan());
    println!("  Dimension: {}", style(config.embedding.dimension).cyan());
    println!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    println!("{}", style("Generation:").bold().yellow());
    println!("  Model: {}", style(&config.generation.model).cyan());
    println!("  Timeout: {}s", style(config.generation.timeout_secs).cyan());

    println!("{}", style("Chunking:").bold().yellow());
    println!("  Size: {}", style(config.chunking.chunk_size).cyan());
    println!("  Overlap: {}", style(config.chunking.chunk_overlap).cyan());

    println!("{}", style("Retrieval:").bold().yellow());
    println!("  Top K: {}", style(config.retrieval.top_k).cyan());
    println!("  History Window: {}", style(config.retrieval.history_window).cyan());

    println!("{}", style("Storage:").bold().yellow());
    println!(
        "  On Corrupt Index: {}",
        style(format!("{:?}", config.storage.on_corrupt)).cyan()
    );
    println!("  Index Directory: {}", style(config.index_dir().display()).dim());

    println!();
    println!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Write a default configuration file, asking before replacing one
#[inline]
pub fn init_config(data_dir: &Path) -> Result<()> {
    let config = Config {
        base_dir: data_dir.to_path_buf(),
        ..Config::default()
    };
    let config_path = config.config_file_path();

    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!(
                "{} already exists. Replace it with defaults?",
                config_path.display()
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !overwrite {
            eprintln!("{}", style("Configuration left unchanged.").yellow());
            return Ok(());
        }
    }

    config.save()?;
    eprintln!("{}", style("✓ Configuration saved successfully!").green());
    eprintln!("Config file: {}", style(config_path.display()).cyan());

    Ok(())
}
