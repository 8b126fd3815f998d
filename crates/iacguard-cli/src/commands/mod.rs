//! CLI commands and argument parsing.

pub mod packs;
pub mod rules;
pub mod scan;
pub mod snapshot;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;

use iacguard_core::{PolicyIndex, DEFAULT_LANGUAGE};
use iacguard_loader::{load_with_fallback, snapshot::load_embedded, LoaderConfig};

/// iacguard - compliance scanner for Infrastructure-as-Code templates
#[derive(Parser)]
#[command(name = "iacguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that needs the policy catalog.
#[derive(Args)]
pub struct GlobalArgs {
    /// Workspace policy directory (defaults to ./.iacguard/policies)
    #[arg(long, global = true, env = "IACGUARD_POLICY_DIR")]
    pub policy_dir: Option<PathBuf>,

    /// Index snapshot used as the embedded policy tier
    #[arg(long, global = true, env = "IACGUARD_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Output language for rule text
    #[arg(long, global = true, env = "IACGUARD_LANG", default_value = DEFAULT_LANGUAGE)]
    pub lang: String,
}

impl GlobalArgs {
    /// Loads the merged policy catalog.
    pub fn load_index(&self) -> Result<PolicyIndex> {
        let cwd = std::env::current_dir().context("Cannot determine the current directory")?;
        let mut config = LoaderConfig::standard(&cwd);
        if let Some(dir) = &self.policy_dir {
            config = config.with_workspace_dir(dir);
        }
        if let Some(index) = load_embedded(self.snapshot.as_deref()) {
            config = config.with_embedded(index);
        }
        debug!(
            user = ?config.user_dir,
            workspace = ?config.workspace_dir,
            embedded = config.embedded.is_some(),
            "Loading policy catalog"
        );

        load_with_fallback(&config).context("Failed to load policies")
    }
}

/// Output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Validate rule and pack files
    Validate(validate::ValidateArgs),

    /// List rules
    Rules(rules::RulesArgs),

    /// List packs
    Packs(packs::PacksArgs),

    /// Scan a template
    Scan(scan::ScanArgs),

    /// Write an index snapshot of a policy directory
    Snapshot(snapshot::SnapshotArgs),

    /// Print version information
    Version,
}
