//! Canonical ID generation and wildcard ID matching.
//!
//! Rule and pack IDs have the form `<kind>:<provider>[:<sub>...]:<slug>`.
//! When an author omits the ID, it is derived from the file's location
//! below the directory it was discovered in.
//!
//! # Examples
//!
//! ```rust
//! use std::path::Path;
//! use iacguard_core::ids::{generate_rule_id, match_pattern};
//!
//! let id = generate_rule_id(
//!     Path::new("policies/aliyun/rules/ecs_public_ip.rego"),
//!     Path::new("policies/aliyun/rules"),
//!     "ecs_public_ip",
//! );
//! assert_eq!(id, "rule:aliyun:ecs-public-ip");
//! assert!(match_pattern("rule:aliyun:*", &id));
//! ```

use std::path::{Component, Path};

use crate::policy::PolicyKind;

/// Kind of ID to generate. Alias kept for call-site readability.
pub type IdKind = PolicyKind;

const RULES_DIR: &str = "rules";
const PACKS_DIR: &str = "packs";

fn is_layout_dir(segment: &str) -> bool {
    segment == RULES_DIR || segment == PACKS_DIR
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Derives the ID prefix (`rule:aliyun`, `pack:aliyun:network`, ...) for a
/// file below `base_dir`.
///
/// The provider is the directory preceding a `rules`/`packs` component of
/// `base_dir`, or the last segment of `base_dir` when there is none.
/// Directories between `base_dir` and the file (other than `rules`/`packs`)
/// become extra namespace components.
///
/// Never fails: when `file_path` is not below `base_dir`, the degenerate
/// prefix `<kind>:` is returned.
#[must_use]
pub fn generate_id_prefix(file_path: &Path, base_dir: &Path, kind: IdKind) -> String {
    let degenerate = || format!("{}:", kind.id_prefix());

    let Ok(relative) = file_path.strip_prefix(base_dir) else {
        return degenerate();
    };

    let base_segments = normal_segments(base_dir);
    let provider = base_segments
        .iter()
        .position(|s| is_layout_dir(s))
        .filter(|&idx| idx > 0)
        .map(|idx| base_segments[idx - 1].clone())
        .or_else(|| base_segments.last().cloned());

    let Some(provider) = provider else {
        return degenerate();
    };

    let mut parts = vec![kind.id_prefix().to_string(), provider];
    if let Some(parent) = relative.parent() {
        parts.extend(
            normal_segments(parent)
                .into_iter()
                .filter(|s| !is_layout_dir(s)),
        );
    }

    parts.join(":")
}

/// Converts a `snake_case` slug to `kebab-case`.
#[must_use]
pub fn to_kebab(slug: &str) -> String {
    slug.replace('_', "-")
}

/// Derives a slug from a file name (`ecs_public_ip.rego` -> `ecs-public-ip`).
#[must_use]
pub fn slug_from_path(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map(|stem| to_kebab(&stem.to_string_lossy()))
        .unwrap_or_default()
}

/// Joins a prefix and slug with a single colon.
#[must_use]
pub fn join_id(prefix: &str, slug: &str) -> String {
    if prefix.ends_with(':') {
        format!("{prefix}{slug}")
    } else {
        format!("{prefix}:{slug}")
    }
}

/// Generates a full rule ID from a file location and a slug.
#[must_use]
pub fn generate_rule_id(file_path: &Path, base_dir: &Path, slug: &str) -> String {
    join_id(
        &generate_id_prefix(file_path, base_dir, IdKind::Rule),
        &to_kebab(slug),
    )
}

/// Generates a full pack ID from a file location and a slug.
#[must_use]
pub fn generate_pack_id(file_path: &Path, base_dir: &Path, slug: &str) -> String {
    join_id(
        &generate_id_prefix(file_path, base_dir, IdKind::Pack),
        &to_kebab(slug),
    )
}

/// Matches an ID against a pattern where `*` stands for zero or more
/// characters.
///
/// Without `*` the pattern must equal the ID. Otherwise the text before the
/// first `*` must be a prefix, the text after the last `*` a suffix, and the
/// segments in between must occur in order without overlapping.
#[must_use]
pub fn match_pattern(pattern: &str, id: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == id;
    }

    // At least two segments: the pattern contains a `*`.
    let segments: Vec<&str> = pattern.split('*').collect();
    let first = segments[0];
    let last = segments[segments.len() - 1];
    let middle = &segments[1..segments.len() - 1];

    let Some(mut remaining) = id.strip_prefix(first) else {
        return false;
    };
    match remaining.strip_suffix(last) {
        Some(r) => remaining = r,
        None => return false,
    }

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match remaining.find(segment) {
            Some(idx) => remaining = &remaining[idx + segment.len()..],
            None => return false,
        }
    }

    true
}
