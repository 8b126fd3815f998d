//! Scan command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use tracing::info;

use iacguard_scan::{select, EvalOptions, Evaluator, MapperConfig, RichViolation, SourceMapper};

use super::{GlobalArgs, OutputFormat};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Template file (JSON or YAML)
    pub template: PathBuf,

    /// Only run rules matching this pattern (repeatable, `*` wildcards)
    #[arg(long = "rule", value_name = "PATTERN")]
    pub rules: Vec<String>,

    /// Only run rules of packs matching this pattern (repeatable)
    #[arg(long = "pack", value_name = "PATTERN")]
    pub packs: Vec<String>,

    /// Snippet lines shown around each violation
    #[arg(long, default_value_t = 2)]
    pub context: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Runs the scan command.
pub fn run(global: &GlobalArgs, args: &ScanArgs) -> Result<()> {
    info!(template = ?args.template, "Scanning template");

    let input = load_template(&args.template)?;
    let index = global.load_index()?;

    let mut options = EvalOptions::from_index(&index);
    if !args.rules.is_empty() || !args.packs.is_empty() {
        let selection = select(&index, &args.rules, &args.packs);
        if selection.rule_ids.is_empty() {
            anyhow::bail!("No rules match the given --rule/--pack patterns");
        }
        options = options.with_selection(selection);
    }

    let outcome = Evaluator::new().evaluate(&options, &input)?;

    // Templates are evaluated as plain documents; without a node tree,
    // violations carry no line information.
    let mut mapper = SourceMapper::new(
        MapperConfig::default()
            .with_context_lines(args.context)
            .with_language(&global.lang),
    );
    let mut violations = mapper.enrich(outcome.violations, &args.template, None, Some(&index));
    violations.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.id.cmp(&b.id)));

    match args.format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "file": args.template,
                "ruleCount": outcome.rule_count,
                "violations": violations,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print!("{}", render_text(&args.template, outcome.rule_count, &violations)),
    }

    if !violations.is_empty() {
        anyhow::bail!("{} violations found", violations.len());
    }
    Ok(())
}

/// Reads a JSON or YAML template into an input document.
fn load_template(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse template {}", path.display()))?;
    if !value.is_object() {
        anyhow::bail!("Template {} is not a mapping", path.display());
    }
    Ok(value)
}

/// Printed when violations could not be placed on a template line.
const NO_LINE_NOTE: &str =
    "note: line information is unavailable; locations are resource and property paths";

fn render_text(template: &Path, rule_count: usize, violations: &[RichViolation]) -> String {
    let mut lines = vec![template.display().to_string()];
    for violation in violations {
        let location = if violation.resource_id.is_empty() {
            violation.path_string()
        } else if violation.violation_path.is_empty() {
            violation.resource_id.clone()
        } else {
            format!("{}.{}", violation.resource_id, violation.path_string())
        };
        let location = if violation.line > 0 {
            format!("{location} (line {})", violation.line)
        } else {
            location
        };
        lines.push(format!(
            "  [{}] {}  {}",
            violation.severity.as_str(),
            violation.id,
            location
        ));
        if !violation.reason.is_empty() {
            lines.push(format!("    {}", violation.reason));
        }
        if !violation.recommendation.is_empty() {
            lines.push(format!("    fix: {}", violation.recommendation));
        }
    }
    lines.push(String::new());
    if violations.iter().any(|v| v.line == 0) {
        lines.push(NO_LINE_NOTE.to_string());
    }
    lines.push(format!("{} violations from {} rules", violations.len(), rule_count));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use iacguard_scan::PathSegment;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml_and_json_templates() {
        let temp = TempDir::new().unwrap();

        let yaml = temp.path().join("stack.yaml");
        std::fs::write(
            &yaml,
            "Resources:\n  Web:\n    Type: ALIYUN::ECS::Instance\n    Properties:\n      AllocatePublicIP: true\n",
        )
        .unwrap();
        let value = load_template(&yaml).unwrap();
        assert_eq!(
            value["Resources"]["Web"]["Properties"]["AllocatePublicIP"],
            Value::Bool(true)
        );

        let json = temp.path().join("stack.json");
        std::fs::write(&json, r#"{"Resources": {"Db": {"Type": "ALIYUN::RDS::DBInstance"}}}"#).unwrap();
        assert_eq!(
            load_template(&json).unwrap()["Resources"]["Db"]["Type"],
            "ALIYUN::RDS::DBInstance"
        );
    }

    #[test]
    fn test_text_output_notes_missing_lines() {
        let template = Path::new("stack.yaml");
        let violation = |line| RichViolation {
            id: "rule:aliyun:ecs:instance-no-public-ip".to_string(),
            resource_id: "Web".to_string(),
            violation_path: vec![PathSegment::from("Properties"), PathSegment::from("AllocatePublicIP")],
            line,
            ..RichViolation::default()
        };

        let unplaced = render_text(template, 1, &[violation(0)]);
        assert!(unplaced.contains("Web.Properties.AllocatePublicIP\n"), "{unplaced}");
        assert!(unplaced.contains(NO_LINE_NOTE));

        let placed = render_text(template, 1, &[violation(5)]);
        assert!(placed.contains("(line 5)"));
        assert!(!placed.contains(NO_LINE_NOTE));

        let clean = render_text(template, 1, &[]);
        assert!(clean.ends_with("0 violations from 1 rules\n"));
        assert!(!clean.contains(NO_LINE_NOTE));
    }

    #[test]
    fn test_load_template_rejects_scalars() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scalar.yaml");
        std::fs::write(&path, "just text\n").unwrap();
        assert!(load_template(&path).is_err());
        assert!(load_template(&temp.path().join("missing.yaml")).is_err());
    }
}
