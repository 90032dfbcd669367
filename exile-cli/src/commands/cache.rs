//! `exile cache` / `exile clean`: local object cache maintenance.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;

use crate::open_workspace;

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Delete every cached object.
    Clean,

    /// Show object count and size.
    Info {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Clean => clean(),
        CacheCommand::Info { json } => info(json),
    }
}

pub fn clean() -> Result<()> {
    let workspace = open_workspace()?;
    let removed = workspace
        .purge_cache()
        .context("failed to remove object cache")?;
    if removed {
        println!("✓ removed {}", workspace.cache_dir().display());
    } else {
        println!("✓ no cache to remove");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CacheReport {
    path: String,
    objects: usize,
    bytes: u64,
    newest: Option<DateTime<Utc>>,
}

fn info(json: bool) -> Result<()> {
    let workspace = open_workspace()?;
    let info = workspace
        .cache_info()
        .context("failed to read object cache")?;
    let report = CacheReport {
        path: workspace.cache_dir().display().to_string(),
        objects: info.objects,
        bytes: info.bytes,
        newest: info.newest,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.path.bold());
    println!("  objects  {}", report.objects);
    println!("  size     {}", format_bytes(report.bytes));
    let newest = report
        .newest
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".dimmed().to_string());
    println!("  newest   {newest}");
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}
