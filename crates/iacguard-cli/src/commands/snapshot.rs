//! Snapshot command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use iacguard_loader::{write_snapshot, IndexSnapshot, PolicyLoader};

/// Arguments for the snapshot command.
#[derive(Args)]
pub struct SnapshotArgs {
    /// Policy directory to index
    #[arg(default_value = "policies")]
    pub path: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "iacguard-index.json")]
    pub output: PathBuf,
}

/// Runs the snapshot command.
pub fn run(args: &SnapshotArgs) -> Result<()> {
    info!(path = ?args.path, output = ?args.output, "Building index snapshot");

    let index = PolicyLoader::new()
        .load(&args.path)
        .with_context(|| format!("Failed to load {}", args.path.display()))?;
    if index.is_empty() {
        anyhow::bail!("No rules or packs found in {}", args.path.display());
    }

    let snapshot = IndexSnapshot::new(index);
    write_snapshot(&snapshot, &args.output)?;

    println!(
        "✓ Wrote {} rules, {} packs to {}",
        snapshot.index.rule_count(),
        snapshot.index.pack_count(),
        args.output.display()
    );
    Ok(())
}
