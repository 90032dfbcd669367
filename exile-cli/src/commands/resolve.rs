//! `exile resolve`: materialize tracked files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use exile_sync::{DispatchOptions, DEFAULT_QUEUE_CAPACITY};

use crate::open_workspace;

/// Arguments for `exile resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Files or directories to resolve (default: everything tracked).
    pub paths: Vec<PathBuf>,

    /// Transfer even when the file looks up to date.
    #[arg(short, long)]
    pub force: bool,
}

impl ResolveArgs {
    pub fn run(self, jobs: usize) -> Result<()> {
        let workspace = open_workspace()?;
        let factory = workspace
            .remote_factory()
            .context("failed to set up remote")?;
        let options = DispatchOptions {
            workers: jobs,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            force: self.force,
        };

        let report = workspace
            .resolve(&self.paths, factory.as_ref(), options)
            .context("resolve failed")?;

        let t = report.transfers;
        if report.files == 0 {
            println!("✓ nothing to resolve");
            return Ok(());
        }
        println!(
            "✓ resolved {} file(s) ({} fetched, {} from cache, {} up to date)",
            report.files, t.fetched, t.served_from_cache, t.up_to_date
        );
        Ok(())
    }
}
