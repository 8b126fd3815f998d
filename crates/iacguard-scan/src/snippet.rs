//! Source snippets around a violation line.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::violation::SnippetLine;

/// Lines shown on each side of the target line by default.
pub const DEFAULT_CONTEXT_LINES: usize = 2;

/// Text around one line of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snippet {
    /// The target line, trimmed.
    pub line: String,
    /// The target line with its context window.
    pub lines: Vec<SnippetLine>,
}

/// Reads snippets from template files, caching each file's lines.
///
/// Unreadable files yield empty snippets.
#[derive(Debug)]
pub struct SnippetExtractor {
    context_lines: usize,
    cache: HashMap<PathBuf, Option<Vec<String>>>,
}

impl Default for SnippetExtractor {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            cache: HashMap::new(),
        }
    }
}

impl SnippetExtractor {
    /// Creates an extractor with the default context window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many lines to show on each side of the target.
    #[must_use]
    pub const fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Returns the snippet for 1-based `line` of `file`.
    pub fn extract(&mut self, file: &Path, line: usize) -> Snippet {
        if line == 0 {
            return Snippet::default();
        }
        let context = self.context_lines;
        let Some(lines) = self.lines(file) else {
            return Snippet::default();
        };
        let Some(target) = lines.get(line - 1) else {
            return Snippet::default();
        };

        let start = line.saturating_sub(context).max(1);
        let end = (line + context).min(lines.len());

        Snippet {
            line: target.trim().to_string(),
            lines: (start..=end)
                .map(|number| SnippetLine {
                    number,
                    content: lines[number - 1].clone(),
                    highlight: number == line,
                })
                .collect(),
        }
    }

    fn lines(&mut self, file: &Path) -> Option<&Vec<String>> {
        self.cache
            .entry(file.to_path_buf())
            .or_insert_with(|| match fs::read_to_string(file) {
                Ok(content) => Some(content.lines().map(str::to_string).collect()),
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "Snippet source unavailable");
                    None
                }
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn template(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("stack.yaml");
        fs::write(&path, "a: 1\nb:\n  c: 2\n  d: 3\ne: 4\nf: 5\n").unwrap();
        path
    }

    #[test]
    fn test_window_and_highlight() {
        let temp = TempDir::new().unwrap();
        let path = template(&temp);

        let snippet = SnippetExtractor::new().extract(&path, 3);
        assert_eq!(snippet.line, "c: 2");
        let numbers: Vec<_> = snippet.lines.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        let highlighted: Vec<_> = snippet.lines.iter().filter(|l| l.highlight).collect();
        assert_eq!(highlighted.len(), 1);
        assert_eq!(highlighted[0].content, "  c: 2");
    }

    #[test]
    fn test_window_is_clamped() {
        let temp = TempDir::new().unwrap();
        let path = template(&temp);
        let mut extractor = SnippetExtractor::new().with_context_lines(1);

        let first = extractor.extract(&path, 1);
        assert_eq!(first.lines.iter().map(|l| l.number).collect::<Vec<_>>(), vec![1, 2]);

        let last = extractor.extract(&path, 6);
        assert_eq!(last.lines.iter().map(|l| l.number).collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_cached_after_first_read() {
        let temp = TempDir::new().unwrap();
        let path = template(&temp);
        let mut extractor = SnippetExtractor::new();

        assert_eq!(extractor.extract(&path, 1).line, "a: 1");
        fs::remove_file(&path).unwrap();
        assert_eq!(extractor.extract(&path, 5).line, "e: 4");
    }

    #[test]
    fn test_unknown_line_or_file() {
        let temp = TempDir::new().unwrap();
        let path = template(&temp);
        let mut extractor = SnippetExtractor::new();

        assert_eq!(extractor.extract(&path, 0), Snippet::default());
        assert_eq!(extractor.extract(&path, 99), Snippet::default());
        assert_eq!(
            extractor.extract(Path::new("/definitely/not/here.yaml"), 3),
            Snippet::default()
        );
    }
}
