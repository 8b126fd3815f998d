//! Packs command implementation.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use iacguard_core::match_pattern;

use super::{GlobalArgs, OutputFormat};

/// Arguments for the packs command.
#[derive(Args)]
pub struct PacksArgs {
    /// Only list packs whose ID matches this pattern (`*` wildcards)
    #[arg(default_value = "*")]
    pub pattern: String,

    /// Also list each pack's rules
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackListing<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    rule_ids: &'a [String],
    missing_rule_ids: Vec<&'a str>,
}

/// Runs the packs command.
pub fn run(global: &GlobalArgs, args: &PacksArgs) -> Result<()> {
    let index = global.load_index()?;

    let mut packs: Vec<_> = index
        .packs()
        .iter()
        .filter(|pack| match_pattern(&args.pattern, &pack.id))
        .collect();
    packs.sort_by(|a, b| a.id.cmp(&b.id));

    let listing: Vec<_> = packs
        .iter()
        .map(|pack| PackListing {
            id: &pack.id,
            name: pack.name.resolve(&global.lang),
            description: pack.description.resolve(&global.lang),
            rule_ids: &pack.rule_ids,
            missing_rule_ids: pack
                .rule_ids
                .iter()
                .filter(|id| index.rule(id).is_none())
                .map(String::as_str)
                .collect(),
        })
        .collect();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        OutputFormat::Text => {
            for pack in &listing {
                println!("{}  {} ({} rules)", pack.id, pack.name, pack.rule_ids.len());
                if args.verbose {
                    for rule_id in pack.rule_ids {
                        let marker = if pack.missing_rule_ids.contains(&rule_id.as_str()) {
                            " (not found)"
                        } else {
                            ""
                        };
                        println!("    {rule_id}{marker}");
                    }
                }
            }
            println!("\n{} packs", listing.len());
        }
    }
    Ok(())
}
