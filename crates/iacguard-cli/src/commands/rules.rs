//! Rules command implementation.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use iacguard_core::{match_pattern, sort_rules, Rule, Severity};

use super::{GlobalArgs, OutputFormat};

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    /// Only list rules whose ID matches this pattern (`*` wildcards)
    #[arg(default_value = "*")]
    pub pattern: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleListing<'a> {
    id: &'a str,
    severity: Severity,
    name: &'a str,
    resource_types: &'a [String],
    file_path: String,
}

/// Runs the rules command.
pub fn run(global: &GlobalArgs, args: &RulesArgs) -> Result<()> {
    let index = global.load_index()?;

    let mut rules: Vec<Rule> = index
        .rules()
        .iter()
        .filter(|rule| match_pattern(&args.pattern, &rule.id))
        .cloned()
        .collect();
    sort_rules(&mut rules);

    match args.format {
        OutputFormat::Json => {
            let listing: Vec<_> = rules
                .iter()
                .map(|rule| RuleListing {
                    id: &rule.id,
                    severity: rule.severity,
                    name: rule.name.resolve(&global.lang),
                    resource_types: &rule.resource_types,
                    file_path: rule.file_path.display().to_string(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            for rule in &rules {
                println!(
                    "{:<7} {}  {}",
                    rule.severity.as_str(),
                    rule.id,
                    rule.name.resolve(&global.lang)
                );
            }
            println!("\n{} rules", rules.len());
        }
    }
    Ok(())
}
