//! # issue-sync
//!
//! Mirror issue trackers into a local SQLite database.
//!
//! ## Commands
//!
//! - `sync`: Validate the token and run one cycle per repository
//! - `watch`: Keep repositories in sync until Ctrl-C
//! - `status`: Show what is mirrored
//! - `search`: Search mirrored issues or comments
//! - `comments`: Print an issue's comment thread
//! - `resync`: Re-fetch one issue's comment thread from scratch
//! - `cleanup`: Delete everything mirrored for a repository
//!
//! ## Example
//!
//! ```bash
//! export GITHUB_TOKEN=ghp_...
//!
//! # One-shot mirror
//! issue-sync sync rust-lang/rust
//!
//! # Poll every 5 minutes
//! issue-sync watch rust-lang/rust tokio-rs/tokio
//!
//! # Query the mirror
//! issue-sync search rust-lang/rust "borrow checker" --comments
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use commands::{cleanup, comments, resync, search, status, sync, watch};
use config::AppContext;

/// Mirror issue trackers into a local SQLite database.
#[derive(Parser, Debug)]
#[command(name = "issue-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <data-dir>/issue-sync.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the configuration and the mirror database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Access token (default: read from the variable named by remote.token_env)
    #[arg(long, global = true, env = "ISSUE_SYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the token and run one sync cycle per repository
    Sync {
        /// Repositories as owner/name (default: sync.repositories)
        repos: Vec<String>,
    },

    /// Sync repositories on the poll interval until Ctrl-C
    Watch {
        /// Repositories as owner/name (default: sync.repositories)
        repos: Vec<String>,
    },

    /// Show mirror status
    Status {
        /// Repository as owner/name (default: every configured repository)
        repo: Option<String>,
    },

    /// Case-insensitive substring search over the mirror
    Search {
        /// Repository as owner/name
        repo: String,

        /// Text to look for
        text: String,

        /// Search comments instead of issues
        #[arg(long)]
        comments: bool,

        /// Maximum number of results
        #[arg(long, short)]
        limit: Option<u32>,
    },

    /// Print the comment thread of an issue
    Comments {
        /// Repository as owner/name
        repo: String,

        /// Issue number
        number: i64,
    },

    /// Discard and re-fetch the comment thread of an issue
    Resync {
        /// Repository as owner/name
        repo: String,

        /// Issue number
        number: i64,
    },

    /// Delete every mirrored row and cursor of a repository
    Cleanup {
        /// Repository as owner/name
        repo: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let ctx = AppContext::load(cli.config.as_deref(), &data_dir).await?;

    match cli.command {
        Commands::Sync { repos } => {
            let remote = ctx.http_remote(cli.token)?;
            sync::run(&ctx, remote, &repos).await?;
        }
        Commands::Watch { repos } => {
            let remote = ctx.http_remote(cli.token)?;
            watch::run(&ctx, remote, &repos).await?;
        }
        Commands::Status { repo } => {
            status::run(&ctx, repo.as_deref()).await?;
        }
        Commands::Search {
            repo,
            text,
            comments,
            limit,
        } => {
            search::run(&ctx, &repo, &text, comments, limit).await?;
        }
        Commands::Comments { repo, number } => {
            comments::run(&ctx, &repo, number).await?;
        }
        Commands::Resync { repo, number } => {
            let remote = ctx.http_remote(cli.token)?;
            resync::run(&ctx, remote, &repo, number).await?;
        }
        Commands::Cleanup { repo, yes } => {
            if !yes {
                anyhow::bail!("Refusing to delete the mirror of {repo} without --yes");
            }
            cleanup::run(&ctx, &repo).await?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default: info).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Get the default data directory for issue-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "issue-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
