//! `exile rm`: stop tracking files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::open_workspace;

/// Arguments for `exile rm`.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Tracked files or directories to forget.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

impl RmArgs {
    pub fn run(self) -> Result<()> {
        let mut workspace = open_workspace()?;
        let removed = workspace.untrack(&self.paths);
        if removed == 0 {
            println!("✓ nothing to untrack");
            return Ok(());
        }
        workspace.save().context("failed to save manifest")?;
        println!("✓ untracked {removed} file(s)");
        Ok(())
    }
}
