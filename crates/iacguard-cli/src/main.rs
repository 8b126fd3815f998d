//! iacguard CLI - compliance scanning for Infrastructure-as-Code templates.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iacguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate(args) => commands::validate::run(&args),
        Commands::Rules(args) => commands::rules::run(&cli.global, &args),
        Commands::Packs(args) => commands::packs::run(&cli.global, &args),
        Commands::Scan(args) => commands::scan::run(&cli.global, &args),
        Commands::Snapshot(args) => commands::snapshot::run(&args),
        Commands::Version => {
            println!("iacguard {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
