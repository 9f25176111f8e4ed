//! # luat CLI
//!
//! The `luat` binary builds the indexes and answers questions over them.
//!
//! ## Usage
//!
//! ```bash
//! luat --config ./config/luat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `luat build` | Parse the corpus, write the debug export, rebuild both indexes |
//! | `luat chat` | Interactive question loop |
//! | `luat ask "<q>"` | One-shot answer with cited sources |
//! | `luat search "<q>"` | Retrieval and reranking only, no answer |
//! | `luat parse <file>` | Print the units parsed from one document |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `warn`). API keys may be placed in a `.env` file.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use luat_rag::chat::{render_answer, run_chat};
use luat_rag::config::{self, Config};
use luat_rag::embedding::create_embedder;
use luat_rag::engine::Engine;
use luat_rag::indexer::run_build;
use luat_rag::ingest::ingest_file;
use luat_rag::progress::ProgressMode;

/// Hybrid retrieval and cited answering over Vietnamese legal statutes.
///
/// All commands except `parse` read a TOML configuration file.
/// See `config/luat.example.toml` for every option.
#[derive(Parser)]
#[command(name = "luat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/luat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the corpus and rebuild the vector and keyword indexes.
    ///
    /// Both indexes are replaced wholesale. Documents that fail to parse are
    /// reported and skipped; a corpus with no parsable units is an error.
    Build {
        /// Progress output on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Ask questions interactively. Type `exit`, `quit` or `thoát` to leave.
    Chat,

    /// Answer one question and print its sources.
    Ask {
        question: String,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Retrieve and rerank without generating an answer.
    Search {
        query: String,

        /// Search the query exactly as typed.
        #[arg(long)]
        no_rewrite: bool,
    },

    /// Parse one document and print its units as JSON.
    Parse { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    // Parsing a single file needs no configuration.
    if let Commands::Parse { file } = &cli.command {
        let units = ingest_file(file)?;
        println!("{}", serde_json::to_string_pretty(&units)?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { progress } => build(&cfg, progress).await?,
        Commands::Chat => {
            let engine = Engine::from_config(&cfg).await?;
            let stdin = std::io::stdin();
            run_chat(&engine, stdin.lock(), std::io::stdout(), cfg.chat.max_sources).await?;
        }
        Commands::Ask { question, json } => {
            let engine = Engine::from_config(&cfg).await?;
            let answer = engine.ask(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print!("{}", render_answer(&answer, cfg.chat.max_sources));
            }
        }
        Commands::Search { query, no_rewrite } => {
            let engine = Engine::from_config(&cfg).await?;
            let results = engine.search(&query, !no_rewrite).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, r) in results.iter().enumerate() {
                println!("{}. [{:.4}] {}", i + 1, r.rerank_score, r.unit.citation());
                let preview: String = r.unit.content.chars().take(240).collect();
                println!("    {}", preview.replace('\n', "\n    "));
            }
        }
        Commands::Parse { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}

async fn build(cfg: &Config, progress: Option<ProgressArg>) -> Result<()> {
    if !cfg.embedding.is_enabled() {
        bail!("luat build requires an embedding provider. Set [embedding] provider in config.");
    }
    let mode = progress
        .map(ProgressMode::from)
        .unwrap_or_else(ProgressMode::default_for_tty);
    let reporter = mode.reporter();
    let embedder = create_embedder(&cfg.embedding)?;

    let summary = run_build(cfg, embedder.as_ref(), reporter.as_ref()).await?;

    println!("build");
    println!("  documents parsed: {}", summary.documents);
    println!("  documents skipped: {}", summary.failures.len());
    for failure in &summary.failures {
        println!("    {}: {}", failure.file_name, failure.error);
    }
    println!("  units indexed: {}", summary.units);
    println!("  vector index: {}", summary.vector_path.display());
    println!("  keyword index: {}", summary.keyword_path.display());
    println!("ok");
    Ok(())
}
