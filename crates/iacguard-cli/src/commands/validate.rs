//! Validate command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use iacguard_compiler::{PolicyValidator, ValidationResult, ValidationSummary};

use super::OutputFormat;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to a policies directory or a single policy file
    #[arg(default_value = "policies")]
    pub path: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also list files that passed or were skipped
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runs the validate command.
pub fn run(args: &ValidateArgs) -> Result<()> {
    info!(path = ?args.path, "Validating policies");

    let validator = PolicyValidator::new();
    let summary = if args.path.is_file() {
        let mut summary = ValidationSummary::default();
        summary.add(validator.validate_file(&args.path));
        summary
    } else if args.path.is_dir() {
        validator.validate_directory(&args.path)?
    } else {
        anyhow::bail!("Path does not exist: {}", args.path.display());
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_text(&summary, args.verbose),
    }

    if !summary.all_passed() {
        anyhow::bail!("{} of {} files failed validation", summary.failed, summary.total);
    }
    Ok(())
}

fn print_text(summary: &ValidationSummary, verbose: bool) {
    println!("iacguard Policy Validator");
    println!("=========================");

    for result in &summary.results {
        if !result.is_valid() {
            print_failure(result);
        } else if verbose && result.is_skipped() {
            println!("- {} (skipped: not a rule or pack)", result.file_path.display());
        } else if verbose {
            println!("✓ {}", result.file_path.display());
        }
    }

    println!();
    println!(
        "Total: {}  Passed: {}  Failed: {}  Skipped: {}",
        summary.total, summary.passed, summary.failed, summary.skipped
    );
}

fn print_failure(result: &ValidationResult) {
    println!("✗ {}", result.file_path.display());
    for error in &result.errors {
        if error.line > 0 {
            println!("  line {}: [{}] {}", error.line, error.code, error.message);
        } else {
            println!("  [{}] {}", error.code, error.message);
        }
        println!("    hint: {}", error.suggestion);
    }
}
