//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa serve` | Start the HTTP API |
//! | `docqa ask <url> -q <question>...` | Ingest one document and answer questions |
//! | `docqa chunk <file>` | Clean and chunk a local PDF or text file |
//!
//! ## Examples
//!
//! ```bash
//! # Start the API (token read from $DOCQA_BEARER_TOKEN)
//! docqa serve --config ./config/docqa.toml
//!
//! # One-off question against a remote PDF
//! docqa ask https://example.com/policy.pdf -q "What is the grace period?"
//!
//! # Inspect chunk boundaries offline
//! docqa chunk ./policy.pdf --max-chars 500 --overlap 100
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `info,docqa=debug`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docqa::chunk::{chunk_document, clean_text};
use docqa::config::{load_config, ChunkingConfig, Config};
use docqa::extract::{looks_like_pdf, PdfExtractor, TextExtractor};
use docqa::fingerprint::document_fingerprint;
use docqa::rag::RagSystem;
use docqa::server;

const DEFAULT_CONFIG: &str = "./config/docqa.toml";
const DEFAULT_LOG_FILTER: &str = "info,docqa=debug";

/// Question answering over PDF documents.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When omitted, `./config/docqa.toml` is used if it exists; otherwise
    /// built-in defaults apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    Serve,

    /// Ingest a document and answer questions about it.
    Ask {
        /// Document URL (http or https).
        url: String,

        /// Question to answer; repeat for several.
        #[arg(short = 'q', long = "question", required = true)]
        questions: Vec<String>,
    },

    /// Clean and chunk a local file, printing chunk boundaries.
    Chunk {
        /// PDF or UTF-8 text file.
        file: PathBuf,

        /// Window size in characters (overrides `[chunking].max_chars`).
        #[arg(long)]
        max_chars: Option<usize>,

        /// Overlap in characters (overrides `[chunking].overlap_chars`).
        #[arg(long)]
        overlap: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter)
        .init();

    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { url, questions } => {
            let rag = RagSystem::from_config(&cfg)?;
            let results = rag.answer_questions_detailed(&url, &questions).await;
            for (question, result) in questions.iter().zip(results) {
                println!("Q: {}", question);
                println!("A: {}", result.answer);
                println!("   confidence: {:.3}", result.confidence);
                for source in &result.source_chunks {
                    println!("   - {}", source);
                }
                println!();
            }
        }
        Commands::Chunk {
            file,
            max_chars,
            overlap,
        } => {
            let chunking = ChunkingConfig {
                max_chars: max_chars.unwrap_or(cfg.chunking.max_chars),
                overlap_chars: overlap.unwrap_or(cfg.chunking.overlap_chars),
            };
            chunking.validate()?;
            run_chunk(&file, &chunking)?;
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None if Path::new(DEFAULT_CONFIG).exists() => load_config(Path::new(DEFAULT_CONFIG)),
        None => {
            tracing::debug!("no config file found; using defaults");
            Ok(Config::default())
        }
    }
}

fn run_chunk(file: &Path, chunking: &ChunkingConfig) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let raw = if looks_like_pdf(&bytes) {
        PdfExtractor.extract(&bytes)?
    } else {
        String::from_utf8(bytes).context("File is neither a PDF nor UTF-8 text")?
    };
    let text = clean_text(&raw);

    let doc_id = document_fingerprint(&file.display().to_string());
    let chunks = chunk_document(&doc_id, &text, chunking.max_chars, chunking.overlap_chars)?;

    println!(
        "{}: {} chars, {} chunks (max {}, overlap {})",
        file.display(),
        text.chars().count(),
        chunks.len(),
        chunking.max_chars,
        chunking.overlap_chars
    );
    for chunk in &chunks {
        let preview: String = chunk.text.chars().take(60).collect();
        println!(
            "  [{}] {} chars  {}...",
            chunk.chunk_index,
            chunk.text.chars().count(),
            preview
        );
    }

    Ok(())
}
