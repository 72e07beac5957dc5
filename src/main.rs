//! # depcrawl CLI
//!
//! The `depcrawl` binary drives the crawl engine and inspects what it left
//! on disk.
//!
//! ## Usage
//!
//! ```bash
//! depcrawl --config ./config/depcrawl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `depcrawl crawl` | Crawl the search index, resolve dependencies, export CSV |
//! | `depcrawl export` | Rewrite the CSV tables from the result journal |
//! | `depcrawl status` | Summarize the checkpoint and journal (no network) |
//! | `depcrawl quota` | Show the current GitHub request budget |
//! | `depcrawl extract <file>` | Run the extractor over a local manifest |
//! | `depcrawl resolve <location>` | Resolve one package location |
//!
//! ## Examples
//!
//! ```bash
//! # Crawl the first 50 new repositories, then stop
//! depcrawl crawl --limit 50
//!
//! # Start over, discarding the checkpoint and journal
//! depcrawl crawl --fresh
//!
//! # Debug-level logs for the resolver only
//! RUST_LOG=depcrawl::resolver=debug depcrawl resolve https://github.com/vapor/vapor.git
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use depcrawl::config::{self, Config};
use depcrawl::progress::ProgressMode;
use depcrawl::{crawl, export, inspect, status};
use depcrawl_core::models::RepositoryRef;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// depcrawl: a resumable dependency crawler for Swift packages on GitHub.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/depcrawl.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "depcrawl",
    about = "Resumable dependency crawler for Swift packages on GitHub",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/depcrawl.toml`. Built-in defaults are used
    /// when the file does not exist.
    #[arg(long, global = true, default_value = "./config/depcrawl.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the search index and export the results.
    ///
    /// Repositories already in the checkpoint are skipped, so rerunning
    /// after an interruption picks up where the last run stopped.
    Crawl {
        /// Discard the checkpoint and journal before crawling.
        #[arg(long)]
        fresh: bool,

        /// Stop after processing this many new repositories.
        #[arg(long)]
        limit: Option<u64>,

        /// First search page to request.
        #[arg(long, default_value_t = 1)]
        start_page: u32,
    },

    /// Rewrite the CSV tables from the result journal.
    Export,

    /// Summarize the checkpoint and journal.
    Status,

    /// Show the current request budget.
    Quota,

    /// Extract dependencies from a local manifest file.
    Extract {
        /// Manifest file to read.
        file: PathBuf,

        /// Repository to attribute the dependencies to (`owner/name`).
        #[arg(long)]
        repo: Option<RepositoryRef>,
    },

    /// Resolve one package location and print its dependency tree.
    Resolve {
        /// Package location, e.g. `https://github.com/apple/swift-nio.git`.
        location: String,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("depcrawl=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return config::load_config(path);
    }
    warn!("{} not found; using built-in defaults", path.display());
    Ok(Config::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let cfg = load_or_default(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Crawl {
            fresh,
            limit,
            start_page,
        } => {
            crawl::run_crawl(&cfg, fresh, limit, start_page, progress).await?;
        }
        Commands::Export => {
            export::run_export(&cfg).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Quota => {
            status::run_quota(&cfg).await?;
        }
        Commands::Extract { file, repo } => {
            inspect::run_extract(&cfg, &file, repo)?;
        }
        Commands::Resolve { location } => {
            inspect::run_resolve(&cfg, &location).await?;
        }
    }

    Ok(())
}
