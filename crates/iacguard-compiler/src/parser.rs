//! Lightweight Rego source inspection.
//!
//! The evaluator owns real parsing; this module only reads what the scanner
//! needs without compiling anything: the leading `package` declaration and
//! the names of top-level rule heads.

/// Reads namespaces and rule heads from Rego source.
///
/// # Examples
///
/// ```rust
/// use iacguard_compiler::Parser;
///
/// let source = "package iacguard.rules.aliyun.ecs\n\ndeny contains v if { v := 1 }\n";
/// assert_eq!(Parser::package_name(source).as_deref(), Some("iacguard.rules.aliyun.ecs"));
/// assert!(Parser::has_rule(source, "deny"));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Parser;

impl Parser {
    /// Returns the declared package, or `None` if the first non-comment
    /// line is not a `package` declaration.
    #[must_use]
    pub fn package_name(source: &str) -> Option<String> {
        Self::package_declaration(source).map(|(_, name)| name)
    }

    /// Returns the 1-based line and name of the package declaration.
    #[must_use]
    pub fn package_declaration(source: &str) -> Option<(usize, String)> {
        for (line_num, line) in source.lines().enumerate() {
            let trimmed = line.trim();

            // Skip comments and empty lines
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let rest = trimmed.strip_prefix("package")?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let name = rest.trim().trim_end_matches(';').trim();
            return (!name.is_empty()).then(|| (line_num + 1, name.to_string()));
        }

        None
    }

    /// Returns the distinct names of top-level rule heads, in source order.
    #[must_use]
    pub fn rule_heads(source: &str) -> Vec<String> {
        let mut rules = Vec::new();

        for (_, name) in Self::rule_head_lines(source) {
            if !rules.contains(&name) {
                rules.push(name);
            }
        }

        rules
    }

    /// Returns `true` if a top-level rule named `name` is declared.
    ///
    /// Only heads starting at column 0 are seen; an indented head reads as
    /// body text. Callers that need certainty should ask the evaluator.
    #[must_use]
    pub fn has_rule(source: &str, name: &str) -> bool {
        Self::rule_head_lines(source).any(|(_, rule)| rule == name)
    }

    /// Returns the 1-based line of the first head of rule `name`.
    #[must_use]
    pub fn rule_line(source: &str, name: &str) -> Option<usize> {
        Self::rule_head_lines(source)
            .find(|(_, rule)| rule == name)
            .map(|(line, _)| line)
    }

    fn rule_head_lines(source: &str) -> impl Iterator<Item = (usize, String)> + '_ {
        source.lines().enumerate().filter_map(|(idx, line)| {
            // Rule heads start at column 0; indented lines belong to bodies.
            if line.starts_with(char::is_whitespace) {
                return None;
            }
            extract_rule_name(line.trim_end()).map(|name| (idx + 1, name))
        })
    }
}

/// Extracts a rule name from a head line.
fn extract_rule_name(line: &str) -> Option<String> {
    if line.is_empty()
        || line.starts_with('#')
        || line.starts_with("import")
        || line.starts_with("package")
    {
        return None;
    }

    let line = line
        .strip_prefix("default ")
        .map_or(line, str::trim_start);

    // The name ends at the earliest head delimiter.
    let name_end = [":=", " = ", "=", " contains ", " if", "{", "[", "(", "."]
        .iter()
        .filter_map(|delim| line.find(delim))
        .min()?;

    let name = line[..name_end].trim();
    is_valid_identifier(name).then(|| name.to_string())
}

/// Checks if a string is a valid Rego identifier.
fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Extracts a line number from an evaluator error message.
///
/// Understands `line N` and `file:N:col` forms.
#[must_use]
pub fn extract_line_from_error(msg: &str) -> Option<usize> {
    let msg_lower = msg.to_lowercase();

    // Pattern: "line N"
    if let Some(idx) = msg_lower.find("line ") {
        let rest = &msg[idx + 5..];
        if let Some(num_str) = rest.split_whitespace().next() {
            if let Ok(num) = num_str
                .trim_matches(|c: char| !c.is_ascii_digit())
                .parse()
            {
                return Some(num);
            }
        }
    }

    // Pattern: ":N:"
    for part in msg.split(':') {
        if let Ok(num) = part.trim().parse() {
            if num > 0 {
                return Some(num);
            }
        }
    }

    None
}
