//! Mapping violations back to template source.
//!
//! A template's node tree carries the line of every node. A violation path
//! is walked from the document root (or from `Resources.<id>` for
//! resource-scoped violations); when a segment cannot be resolved the walk
//! stops at the deepest node found so far.

use std::path::Path;

use iacguard_core::{PolicyIndex, Severity};
use tracing::debug;

use crate::snippet::{SnippetExtractor, DEFAULT_CONTEXT_LINES};
use crate::violation::{OpaViolation, PathSegment, RichViolation};

/// Top-level key holding a template's resources.
pub const RESOURCES_KEY: &str = "Resources";

/// A parsed template node with its 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    /// Line the node starts on.
    pub line: usize,
    /// Node contents.
    pub kind: NodeKind,
}

/// Shape of a [`SourceNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Key/value pairs; keys are nodes so their own lines are known.
    Mapping(Vec<(SourceNode, SourceNode)>),
    /// Ordered items.
    Sequence(Vec<SourceNode>),
    /// Leaf text.
    Scalar(String),
}

impl SourceNode {
    /// Creates a scalar node.
    #[must_use]
    pub fn scalar(line: usize, value: impl Into<String>) -> Self {
        Self {
            line,
            kind: NodeKind::Scalar(value.into()),
        }
    }

    /// Creates a mapping node.
    #[must_use]
    pub const fn mapping(line: usize, entries: Vec<(Self, Self)>) -> Self {
        Self {
            line,
            kind: NodeKind::Mapping(entries),
        }
    }

    /// Creates a sequence node.
    #[must_use]
    pub const fn sequence(line: usize, items: Vec<Self>) -> Self {
        Self {
            line,
            kind: NodeKind::Sequence(items),
        }
    }

    /// Resolves one path segment, returning the line to report and the child.
    ///
    /// For mappings the reported line is the key's line.
    fn step(&self, segment: &PathSegment) -> Option<(usize, &Self)> {
        match (&self.kind, segment) {
            (NodeKind::Mapping(entries), PathSegment::Key(key)) => entries
                .iter()
                .find(|(k, _)| matches!(&k.kind, NodeKind::Scalar(s) if s == key))
                .map(|(k, v)| (k.line, v)),
            (NodeKind::Mapping(entries), PathSegment::Index(idx)) => {
                let key = idx.to_string();
                entries
                    .iter()
                    .find(|(k, _)| matches!(&k.kind, NodeKind::Scalar(s) if *s == key))
                    .map(|(k, v)| (k.line, v))
            }
            (NodeKind::Sequence(items), PathSegment::Index(idx)) => {
                items.get(*idx).map(|item| (item.line, item))
            }
            (NodeKind::Sequence(items), PathSegment::Key(key)) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .map(|item| (item.line, item)),
            (NodeKind::Scalar(_), _) => None,
        }
    }
}

/// Returns the line for a violation, or 0 when nothing resolves.
///
/// A non-empty `resource_id` scopes `path` below `Resources.<resource_id>`.
#[must_use]
pub fn locate(tree: Option<&SourceNode>, resource_id: &str, path: &[PathSegment]) -> usize {
    let Some(root) = tree else {
        return 0;
    };

    let prefix = if resource_id.is_empty() {
        Vec::new()
    } else {
        vec![
            PathSegment::Key(RESOURCES_KEY.to_string()),
            PathSegment::Key(resource_id.to_string()),
        ]
    };

    let mut node = root;
    let mut line = 0;
    for segment in prefix.iter().chain(path) {
        match node.step(segment) {
            Some((found, child)) => {
                line = found;
                node = child;
            }
            None => {
                debug!(%segment, line, "Path segment unresolved, using nearest ancestor");
                break;
            }
        }
    }
    line
}

/// Configuration for [`SourceMapper`].
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Snippet lines on each side of the target line.
    pub context_lines: usize,
    /// Language `reason` and `recommendation` are resolved for.
    pub language: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            language: iacguard_core::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl MapperConfig {
    /// Sets the snippet context window.
    #[must_use]
    pub const fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Sets the output language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Turns raw violations into [`RichViolation`]s.
///
/// # Example
///
/// ```rust,ignore
/// use iacguard_scan::{MapperConfig, SourceMapper};
///
/// let mut mapper = SourceMapper::new(MapperConfig::default().with_language("zh"));
/// let rich = mapper.enrich(outcome.violations, Path::new("stack.yaml"), Some(&tree), Some(&index));
/// ```
#[derive(Debug)]
pub struct SourceMapper {
    language: String,
    snippets: SnippetExtractor,
}

impl Default for SourceMapper {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

impl SourceMapper {
    /// Creates a mapper.
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        Self {
            snippets: SnippetExtractor::new().with_context_lines(config.context_lines),
            language: config.language,
        }
    }

    /// Enriches violations found in `file`.
    ///
    /// Missing severity, reason or recommendation is filled in from the
    /// catalog rule when `index` knows it.
    pub fn enrich(
        &mut self,
        violations: Vec<OpaViolation>,
        file: &Path,
        tree: Option<&SourceNode>,
        index: Option<&PolicyIndex>,
    ) -> Vec<RichViolation> {
        violations
            .into_iter()
            .map(|violation| self.enrich_one(violation, file, tree, index))
            .collect()
    }

    fn enrich_one(
        &mut self,
        violation: OpaViolation,
        file: &Path,
        tree: Option<&SourceNode>,
        index: Option<&PolicyIndex>,
    ) -> RichViolation {
        let rule = index.and_then(|index| index.rule(&violation.id));
        let line = locate(tree, &violation.resource_id, &violation.violation_path);
        let snippet = self.snippets.extract(file, line);

        let severity = if violation.meta.severity.is_empty() {
            rule.map(|r| r.severity).unwrap_or_default()
        } else {
            Severity::normalize(&violation.meta.severity)
        };
        let raw_reason = violation
            .meta
            .reason
            .or_else(|| rule.map(|r| r.reason.clone()))
            .unwrap_or_default();
        let raw_recommendation = violation
            .meta
            .recommendation
            .or_else(|| rule.map(|r| r.recommendation.clone()))
            .unwrap_or_default();

        let mut rich = RichViolation {
            id: violation.id,
            resource_id: violation.resource_id,
            violation_path: violation.violation_path,
            severity,
            file: file.to_path_buf(),
            line,
            snippet: snippet.line,
            snippet_lines: snippet.lines,
            reason: String::new(),
            recommendation: String::new(),
            raw_reason,
            raw_recommendation,
        };
        rich.localize(&self.language);
        rich
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationMeta;
    use iacguard_core::{I18nString, Rule};
    use std::fs;
    use tempfile::TempDir;

    /// Tree for:
    ///
    /// ```yaml
    /// Resources:            # 1
    ///   VPC:                # 2
    ///     Type: ALIYUN::ECS::VPC
    ///   Web:                # 4
    ///     Type: ALIYUN::ECS::Instance
    ///     Properties:       # 6
    ///       Tags:           # 7
    ///         - Key: env    # 8
    ///         - Key: team   # 9
    /// Outputs: {}           # 10
    /// ```
    fn tree() -> SourceNode {
        let s = SourceNode::scalar;
        let tag = |line: usize, value: &str| {
            SourceNode::mapping(line, vec![(s(line, "Key"), SourceNode::scalar(line, value))])
        };
        SourceNode::mapping(
            1,
            vec![
                (
                    s(1, "Resources"),
                    SourceNode::mapping(
                        2,
                        vec![
                            (
                                s(2, "VPC"),
                                SourceNode::mapping(
                                    3,
                                    vec![(s(3, "Type"), s(3, "ALIYUN::ECS::VPC"))],
                                ),
                            ),
                            (
                                s(4, "Web"),
                                SourceNode::mapping(
                                    5,
                                    vec![
                                        (s(5, "Type"), s(5, "ALIYUN::ECS::Instance")),
                                        (
                                            s(6, "Properties"),
                                            SourceNode::mapping(
                                                7,
                                                vec![(
                                                    s(7, "Tags"),
                                                    SourceNode::sequence(
                                                        8,
                                                        vec![tag(8, "env"), tag(9, "team")],
                                                    ),
                                                )],
                                            ),
                                        ),
                                    ],
                                ),
                            ),
                        ],
                    ),
                ),
                (s(10, "Outputs"), SourceNode::mapping(10, Vec::new())),
            ],
        )
    }

    fn path(segments: &[PathSegment]) -> Vec<PathSegment> {
        segments.to_vec()
    }

    #[test]
    fn test_locate_resolves_key_lines() {
        let tree = tree();
        assert_eq!(locate(Some(&tree), "Web", &path(&["Properties".into()])), 6);
        assert_eq!(
            locate(Some(&tree), "Web", &path(&["Properties".into(), "Tags".into(), PathSegment::Index(1)])),
            9
        );
        assert_eq!(
            locate(
                Some(&tree),
                "Web",
                &path(&["Properties".into(), "Tags".into(), "0".into(), "Key".into()])
            ),
            8
        );
    }

    #[test]
    fn test_locate_falls_back_to_resource_key() {
        let tree = tree();
        let line = locate(
            Some(&tree),
            "VPC",
            &path(&["Properties".into(), "CidrBlock".into()]),
        );
        assert_eq!(line, 2);
    }

    #[test]
    fn test_locate_document_level_and_unresolved() {
        let tree = tree();
        assert_eq!(locate(Some(&tree), "", &path(&["Outputs".into()])), 10);
        assert_eq!(locate(Some(&tree), "", &path(&["Missing".into()])), 0);
        assert_eq!(locate(Some(&tree), "", &[]), 0);
        assert_eq!(locate(None, "Web", &path(&["Properties".into()])), 0);
    }

    #[test]
    fn test_enrich_uses_catalog_fallback() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("stack.yaml");
        fs::write(
            &file,
            "Resources:\n  VPC:\n    Type: ALIYUN::ECS::VPC\n  Web:\n    Type: ALIYUN::ECS::Instance\n",
        )
        .unwrap();

        let mut rule = Rule::new("rule:aliyun:vpc:flow-log-enabled");
        rule.severity = Severity::Medium;
        rule.reason = I18nString::localized([("en", "no flow log"), ("zh", "未开启流日志")]);
        let mut index = PolicyIndex::new();
        index.insert_rule(rule);

        let violation = OpaViolation {
            id: "rule:aliyun:vpc:flow-log-enabled".to_string(),
            resource_id: "VPC".to_string(),
            violation_path: vec!["Properties".into(), "FlowLog".into()],
            meta: ViolationMeta {
                severity: String::new(),
                reason: None,
                recommendation: Some(I18nString::from("enable it")),
            },
        };

        let mut mapper = SourceMapper::new(MapperConfig::default().with_language("zh"));
        let rich = mapper.enrich(vec![violation], &file, Some(&tree()), Some(&index));

        assert_eq!(rich.len(), 1);
        let rich = &rich[0];
        assert_eq!(rich.line, 2);
        assert_eq!(rich.snippet, "VPC:");
        assert_eq!(rich.snippet_lines.len(), 4);
        assert_eq!(rich.severity, Severity::Medium);
        assert_eq!(rich.reason, "未开启流日志");
        assert_eq!(rich.recommendation, "enable it");
    }

    #[test]
    fn test_enrich_without_tree() {
        let violation = OpaViolation {
            id: "x".to_string(),
            resource_id: "Web".to_string(),
            violation_path: Vec::new(),
            meta: ViolationMeta {
                severity: "HIGH".to_string(),
                ..ViolationMeta::default()
            },
        };
        let rich = SourceMapper::default().enrich(vec![violation], Path::new("synthetic"), None, None);
        assert_eq!(rich[0].line, 0);
        assert!(rich[0].snippet_lines.is_empty());
        assert_eq!(rich[0].severity, Severity::High);
        assert!(rich[0].reason.is_empty());
    }
}
