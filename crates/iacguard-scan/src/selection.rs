//! Rule selection and short-ID mapping.
//!
//! Users select rules and packs by wildcard pattern. Selection resolves
//! those patterns against the catalog into the exact full IDs the evaluator
//! filters on; the evaluator itself never sees a wildcard.

use std::collections::{HashMap, HashSet};

use iacguard_core::{match_pattern, PolicyIndex};
use serde::Serialize;
use tracing::{debug, warn};

/// Rules and packs chosen by pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Full rule IDs, first-seen order, no duplicates.
    pub rule_ids: Vec<String>,
    /// Full IDs of matched packs.
    pub pack_ids: Vec<String>,
}

impl Selection {
    /// Returns `true` when nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rule_ids.is_empty() && self.pack_ids.is_empty()
    }
}

/// Resolves rule and pack patterns against `index`.
///
/// Rules matched directly come first, followed by the members of matched
/// packs. Pack members that are not in the catalog are dropped with a
/// warning.
///
/// # Examples
///
/// ```
/// use iacguard_core::{PolicyIndex, Rule};
/// use iacguard_scan::select;
///
/// let mut index = PolicyIndex::new();
/// index.insert_rule(Rule::new("rule:aliyun:ecs-instance-no-public-ip"));
/// index.insert_rule(Rule::new("rule:aliyun:rds-instance-multi-zone"));
///
/// let selection = select(&index, &["rule:aliyun:ecs-*".to_string()], &[]);
/// assert_eq!(selection.rule_ids, vec!["rule:aliyun:ecs-instance-no-public-ip"]);
/// ```
#[must_use]
pub fn select(index: &PolicyIndex, rule_patterns: &[String], pack_patterns: &[String]) -> Selection {
    let mut selection = Selection::default();
    let mut seen = HashSet::new();

    for pattern in rule_patterns {
        let before = selection.rule_ids.len();
        for rule in index.rules().iter().filter(|r| match_pattern(pattern, &r.id)) {
            if seen.insert(rule.id.clone()) {
                selection.rule_ids.push(rule.id.clone());
            }
        }
        if selection.rule_ids.len() == before {
            debug!(pattern, "Rule pattern added no rules");
        }
    }

    for pattern in pack_patterns {
        let packs: Vec<_> = index
            .packs()
            .iter()
            .filter(|p| match_pattern(pattern, &p.id))
            .collect();
        if packs.is_empty() {
            warn!(pattern, "Pack pattern matched no packs");
        }

        for pack in packs {
            if !selection.pack_ids.contains(&pack.id) {
                selection.pack_ids.push(pack.id.clone());
            }
            for rule_id in &pack.rule_ids {
                if index.rule(rule_id).is_none() {
                    warn!(pack = %pack.id, rule = %rule_id, "Pack references unknown rule, ignoring");
                    continue;
                }
                if seen.insert(rule_id.clone()) {
                    selection.rule_ids.push(rule_id.clone());
                }
            }
        }
    }

    selection
}

/// Maps each rule's short ID (its last segment) to its full ID.
///
/// When two rules share a short ID the first keeps it. The evaluator only
/// falls back to this mapping for packages with no known rule, see
/// [`EvalOptions::package_rules`](crate::EvalOptions::package_rules).
#[must_use]
pub fn build_id_mapping(index: &PolicyIndex) -> HashMap<String, String> {
    let mut mapping: HashMap<String, String> = HashMap::new();

    for rule in index.rules() {
        let short = rule.short_id();
        if short == rule.id {
            continue;
        }
        match mapping.get(short) {
            Some(owner) if *owner != rule.id => {
                debug!(short, owner = %owner, ignored = %rule.id, "Ambiguous short rule ID");
            }
            Some(_) => {}
            None => {
                mapping.insert(short.to_string(), rule.id.clone());
            }
        }
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use iacguard_core::{Pack, Rule};

    fn index() -> PolicyIndex {
        let mut index = PolicyIndex::new();
        for id in [
            "rule:aliyun:ecs-instance-no-public-ip",
            "rule:aliyun:rds-instance-multi-zone",
            "rule:aliyun:rds-instance-enabled-tde",
            "rule:aws:s3:bucket-encrypted",
        ] {
            index.insert_rule(Rule::new(id));
        }

        let mut pack = Pack::new("pack:aliyun:baseline");
        pack.rule_ids = vec![
            "rule:aliyun:rds-instance-enabled-tde".to_string(),
            "rule:aliyun:missing".to_string(),
            "rule:aliyun:ecs-instance-no-public-ip".to_string(),
        ];
        index.insert_pack(pack);
        index
    }

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_select_rules_by_pattern() {
        let selection = select(&index(), &patterns(&["rule:aliyun:*-multi-zone", "rule:aws:*"]), &[]);
        assert_eq!(
            selection.rule_ids,
            vec!["rule:aliyun:rds-instance-multi-zone", "rule:aws:s3:bucket-encrypted"]
        );
        assert!(selection.pack_ids.is_empty());
    }

    #[test]
    fn test_select_pack_drops_dangling_and_dedupes() {
        let selection = select(
            &index(),
            &patterns(&["rule:aliyun:ecs-*"]),
            &patterns(&["pack:aliyun:*"]),
        );
        assert_eq!(
            selection.rule_ids,
            vec![
                "rule:aliyun:ecs-instance-no-public-ip",
                "rule:aliyun:rds-instance-enabled-tde",
            ]
        );
        assert_eq!(selection.pack_ids, vec!["pack:aliyun:baseline"]);
    }

    #[test]
    fn test_select_nothing() {
        let selection = select(&index(), &patterns(&["rule:gcp:*"]), &patterns(&["pack:none"]));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_build_id_mapping() {
        let mut index = index();
        index.insert_rule(Rule::new("rule:tencent:bucket-encrypted"));
        index.insert_rule(Rule::new("plain"));

        let mapping = build_id_mapping(&index);
        assert_eq!(
            mapping.get("ecs-instance-no-public-ip").map(String::as_str),
            Some("rule:aliyun:ecs-instance-no-public-ip")
        );
        assert_eq!(
            mapping.get("bucket-encrypted").map(String::as_str),
            Some("rule:aws:s3:bucket-encrypted")
        );
        assert!(!mapping.contains_key("plain"));
        assert_eq!(mapping.len(), 4);
    }
}
