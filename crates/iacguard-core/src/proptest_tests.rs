//! Property-based tests for iacguard-core.
//!
//! These tests use proptest to verify invariants across many randomly generated inputs.

use std::path::PathBuf;

use proptest::prelude::*;

use crate::ids::{generate_id_prefix, generate_rule_id, match_pattern, IdKind};
use crate::index::PolicyIndex;
use crate::policy::{Rule, Severity};

/// Strategy for generating full rule IDs.
fn rule_id_strategy() -> impl Strategy<Value = String> {
    (
        "(aliyun|aws|terraform|test)",
        "[a-z][a-z0-9-]{2,30}",
    )
        .prop_map(|(provider, slug)| format!("rule:{provider}:{slug}"))
}

/// Strategy for generating path segments.
fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}"
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::High),
        Just(Severity::Medium),
        Just(Severity::Low),
    ]
}

proptest! {
    #[test]
    fn star_matches_everything(id in ".*") {
        prop_assert!(match_pattern("*", &id));
    }

    #[test]
    fn pattern_without_star_is_equality(a in "[a-z:-]{0,20}", b in "[a-z:-]{0,20}") {
        prop_assert_eq!(match_pattern(&a, &b), a == b);
    }

    #[test]
    fn prefix_pattern_matches_its_extensions(id in rule_id_strategy(), cut in 0usize..40) {
        let cut = cut.min(id.len());
        let pattern = format!("{}*", &id[..cut]);
        prop_assert!(match_pattern(&pattern, &id));
    }

    #[test]
    fn suffix_and_infix_patterns_match(id in rule_id_strategy(), a in 0usize..40, b in 0usize..40) {
        let (lo, hi) = (a.min(b).min(id.len()), a.max(b).min(id.len()));
        let infix = format!("*{}*", &id[lo..hi]);
        let suffix = format!("*{}", &id[lo..]);
        prop_assert!(match_pattern(&infix, &id));
        prop_assert!(match_pattern(&suffix, &id));
    }

    #[test]
    fn id_generation_is_deterministic(
        provider in "(aliyun|aws|huawei|tencent)",
        subdirs in prop::collection::vec("[a-z][a-z0-9]{0,8}", 0..3),
        file in segment_strategy(),
    ) {
        let base = PathBuf::from("/policies").join(&provider).join("rules");
        let mut path = base.clone();
        for dir in &subdirs {
            path.push(dir);
        }
        path.push(format!("{file}.rego"));

        let first = generate_rule_id(&path, &base, &file);
        let second = generate_rule_id(&path, &base, &file);
        prop_assert_eq!(&first, &second);
        let expected_prefix = format!("rule:{provider}");
        prop_assert!(first.starts_with(&expected_prefix));
        prop_assert!(!first.contains('_'));
    }

    #[test]
    fn id_prefix_never_panics(path in "[a-z/._]{0,30}", base in "[a-z/._]{0,30}") {
        let prefix = generate_id_prefix(&PathBuf::from(path), &PathBuf::from(base), IdKind::Pack);
        prop_assert!(prefix.starts_with("pack:"));
    }

    #[test]
    fn merge_keeps_each_id_once(
        base_rules in prop::collection::vec((rule_id_strategy(), severity_strategy()), 0..10),
        overlay_rules in prop::collection::vec((rule_id_strategy(), severity_strategy()), 0..10),
    ) {
        let build = |entries: &[(String, Severity)]| {
            let mut index = PolicyIndex::new();
            for (id, severity) in entries {
                let mut rule = Rule::new(id.clone());
                rule.severity = *severity;
                index.insert_rule(rule);
            }
            index
        };
        let base = build(&base_rules);
        let overlay = build(&overlay_rules);
        let merged = PolicyIndex::merge(&base, &overlay);

        let mut ids: Vec<_> = merged.rules().iter().map(|r| r.id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);

        for rule in overlay.rules() {
            prop_assert_eq!(merged.rule(&rule.id), Some(rule));
        }
    }
}
