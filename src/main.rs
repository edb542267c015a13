//! # Vector Memory CLI (`vmem`)
//!
//! Save files into semantic memory, recall passages by similarity, and
//! serve the same operations to AI agents over MCP.
//!
//! ## Usage
//!
//! ```bash
//! vmem --config ./config/memory.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vmem init` | Create the SQLite database and run schema migrations |
//! | `vmem save <paths...>` | Chunk, embed and store files (replacing earlier saves) |
//! | `vmem recall "<query>"` | Print the most similar saved passages |
//! | `vmem forget <paths...>` | Remove everything saved from the given files |
//! | `vmem sources` | List saved files and their chunk counts |
//! | `vmem serve stdio` | Serve MCP over stdin/stdout |
//! | `vmem serve http` | Serve MCP over streamable HTTP |
//!
//! ## Examples
//!
//! ```bash
//! vmem save docs/design.md papers/attention.pdf --chunk-size 800
//! vmem recall "how are chunks deduplicated?" -k 5
//! RUST_LOG=vector_memory=debug vmem serve http --bind 0.0.0.0:7331
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use vector_memory::config::{self, IndexBackend};
use vector_memory::sqlite_index::SqliteIndex;
use vector_memory::store::DocumentStore;
use vector_memory::{logging, server, tools};

/// Vector Memory: long-term document memory for AI agents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist the built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "vmem",
    about = "Vector Memory: save documents as embedded chunks, recall them by similarity",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/memory.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines (still on stderr).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `entries` table. Running
    /// it more than once is safe.
    Init,

    /// Save files into memory.
    ///
    /// Each file is split into overlapping chunks, embedded and stored.
    /// Chunks from an earlier save of the same file are removed first.
    Save {
        /// Files to save (plain text or PDF).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Maximum characters per chunk (default from config).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive chunks (default from config).
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },

    /// Recall the passages most similar to a query.
    Recall {
        query: String,

        /// Number of passages to return (default from config).
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Remove every chunk saved from the given files.
    Forget {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List saved files and their chunk counts.
    Sources,

    /// Serve the memory tools over MCP.
    Serve {
        #[command(subcommand)]
        transport: ServeTransport,
    },
}

#[derive(Subcommand)]
enum ServeTransport {
    /// One session over stdin/stdout (for agent hosts that spawn a process).
    Stdio,

    /// Streamable HTTP at `/mcp`, plus `GET /health`.
    Http {
        /// Address to bind (default from `[server] bind`).
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.json_logs);

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            match cfg.index.backend {
                IndexBackend::Sqlite => {
                    SqliteIndex::open(&cfg.db.path, cfg.index.name.clone()).await?;
                    println!("Database initialized at {}", cfg.db.path.display());
                }
                IndexBackend::Memory => {
                    println!("In-memory index configured; nothing to initialize.");
                }
            }
        }
        Commands::Save {
            paths,
            chunk_size,
            chunk_overlap,
        } => {
            let store = DocumentStore::open(&cfg).await?;
            let report = store.save(&paths, chunk_size, chunk_overlap).await?;
            println!("{}", report);
        }
        Commands::Recall { query, k } => {
            let store = DocumentStore::open(&cfg).await?;
            let recall = store.recall(&query, k).await?;
            println!("{}", recall);
        }
        Commands::Forget { paths } => {
            let store = DocumentStore::open(&cfg).await?;
            let report = store.forget(&paths).await?;
            println!("{}", report);
        }
        Commands::Sources => {
            let store = DocumentStore::open(&cfg).await?;
            println!("{}", tools::format_sources(&store.sources().await?));
        }
        Commands::Serve { transport } => {
            let store = Arc::new(DocumentStore::open(&cfg).await?);
            match transport {
                ServeTransport::Stdio => server::run_stdio(store).await?,
                ServeTransport::Http { bind } => {
                    let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
                    server::run_http(&bind, store).await?;
                }
            }
        }
    }

    Ok(())
}
