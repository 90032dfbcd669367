//! exile: keep large files out of the repository, tracked by content hash.
//!
//! # Usage
//!
//! ```text
//! exile [-v LEVEL] [-j JOBS] resolve [PATHS...] [--force]
//! exile [-v LEVEL] [-j JOBS] add <PATHS...>
//! exile [-v LEVEL] rm <PATHS...>
//! exile [-v LEVEL] clean
//! exile [-v LEVEL] cache clean|info [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{add::AddArgs, cache::CacheCommand, resolve::ResolveArgs, rm::RmArgs};
use exile_core::PROGRESS_TARGET;
use exile_sync::{Workspace, DEFAULT_WORKERS};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "exile",
    version,
    about = "Track large files by content hash and store them in a remote",
    long_about = None,
)]
struct Cli {
    /// Output verbosity: 0 errors, 1 progress, 2 warnings, 3 debug.
    /// RUST_LOG overrides this when set.
    #[arg(
        short,
        long,
        global = true,
        default_value_t = 2,
        value_parser = clap::value_parser!(u8).range(0..=3),
    )]
    verbosity: u8,

    /// Number of parallel transfer workers.
    #[arg(short = 'j', long, global = true, default_value_t = DEFAULT_WORKERS)]
    jobs: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Materialize tracked files from the cache or the remote.
    Resolve(ResolveArgs),

    /// Track files and upload their contents.
    Add(AddArgs),

    /// Stop tracking files (the files themselves are left alone).
    Rm(RmArgs),

    /// Delete the local object cache. Same as `cache clean`.
    Clean,

    /// Inspect or delete the local object cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Open the workspace whose manifest is at or above the current directory.
pub(crate) fn open_workspace() -> Result<Workspace> {
    let cwd: PathBuf = std::env::current_dir().context("could not determine current directory")?;
    Workspace::discover(&cwd).context("failed to open exile manifest")
}

fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directives = match verbosity {
        0 => "error".to_owned(),
        1 => format!("error,{PROGRESS_TARGET}=info"),
        2 => format!("warn,{PROGRESS_TARGET}=info"),
        _ => "debug".to_owned(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);

    match cli.command {
        Commands::Resolve(args) => args.run(cli.jobs),
        Commands::Add(args) => args.run(cli.jobs),
        Commands::Rm(args) => args.run(),
        Commands::Clean => commands::cache::clean(),
        Commands::Cache { command } => commands::cache::run(command),
    }
}
