//! # Socratic Tutor CLI (`tutor`)
//!
//! The `tutor` binary manages the document store, runs retrieval queries
//! from the terminal, and starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! tutor --config ./config/tutor.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tutor init` | Create the SQLite database and run schema migrations |
//! | `tutor add <path>` | Extract, chunk, and store a document |
//! | `tutor list` | List stored documents |
//! | `tutor get <id>` | Print a document and its passages |
//! | `tutor delete <id>` | Delete a document |
//! | `tutor retrieve <id> "<query>"` | Top-k passages for a query |
//! | `tutor chunk <path>` | Preview how a file is split into passages |
//! | `tutor serve` | Start the HTTP server |
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`; set `RUST_LOG` to adjust
//! (default `info,socratic_tutor=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use socratic_tutor::{commands, config, migrate, server};
use socratic_tutor_core::models::{Level, Subject};
use socratic_tutor_core::ChunkParams;

/// Socratic Tutor: document store and passage retriever for a Socratic AI tutor.
#[derive(Parser)]
#[command(name = "tutor", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tutor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Extract text from a file and store it as a document.
    Add {
        /// Path to a .txt, .md, .pdf, or .docx file.
        path: PathBuf,

        /// Subject: math, physics, biology, history, chemistry, general.
        #[arg(long, default_value = "general")]
        subject: Subject,

        /// Level: beginner, intermediate, advanced.
        #[arg(long, default_value = "intermediate")]
        level: Level,

        /// Owner of the document.
        #[arg(long = "user")]
        user_id: Option<String>,
    },

    /// List stored documents in creation order.
    List {
        /// Only documents owned by this user.
        #[arg(long = "user")]
        user_id: Option<String>,
    },

    /// Print a document, its content, and its passages.
    Get {
        /// Document UUID.
        id: String,
    },

    /// Delete a document and its passages.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Rank a document's passages against a query.
    Retrieve {
        /// Document UUID.
        id: String,

        /// Query text.
        query: String,

        /// Number of passages to return (defaults to `retrieval.default_k`).
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Preview how a file is split into passages. Does not touch the database.
    Chunk {
        /// Path to a .txt, .md, .pdf, or .docx file.
        path: PathBuf,

        /// Target passage size in characters.
        #[arg(long)]
        target_size: Option<usize>,

        /// Overlap between adjacent passages in characters.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,socratic_tutor=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Chunk previews work without a config file
    if let Commands::Chunk {
        path,
        target_size,
        overlap,
    } = &cli.command
    {
        let defaults = config::load_config(&cli.config)
            .map(|c| c.chunking.params())
            .unwrap_or_default();
        let params = ChunkParams::new(
            target_size.unwrap_or(defaults.target_size),
            overlap.unwrap_or(defaults.overlap),
        )?;
        commands::run_chunk(path, params)?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            path,
            subject,
            level,
            user_id,
        } => {
            commands::run_add(&cfg, &path, subject, level, user_id).await?;
        }
        Commands::List { user_id } => {
            commands::run_list(&cfg, user_id.as_deref()).await?;
        }
        Commands::Get { id } => {
            commands::run_get(&cfg, &id).await?;
        }
        Commands::Delete { id } => {
            commands::run_delete(&cfg, &id).await?;
        }
        Commands::Retrieve { id, query, k } => {
            commands::run_retrieve(&cfg, &id, &query, k).await?;
        }
        Commands::Chunk { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
