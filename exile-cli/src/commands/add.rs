//! `exile add`: hash files, record them in the manifest and upload them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use exile_sync::{DispatchOptions, DEFAULT_QUEUE_CAPACITY};

use crate::open_workspace;

/// Arguments for `exile add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Files or directories to track. Directories are added recursively.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

impl AddArgs {
    pub fn run(self, jobs: usize) -> Result<()> {
        let mut workspace = open_workspace()?;
        let factory = workspace
            .remote_factory()
            .context("failed to set up remote")?;
        let options = DispatchOptions {
            workers: jobs,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            force: false,
        };

        let report = workspace
            .add(&self.paths, factory.as_ref(), options)
            .context("add failed")?;

        if report.added.is_empty() {
            println!(
                "✓ nothing to add ({} unchanged, {} skipped)",
                report.unchanged, report.skipped
            );
            return Ok(());
        }

        println!(
            "✓ added {} file(s) ({} unchanged, {} skipped)",
            report.added.len(),
            report.unchanged,
            report.skipped
        );
        for path in &report.added {
            println!("  ✎  {}", path.display());
        }
        Ok(())
    }
}
