use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};

/// Unchanged lines kept on each side of a change.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    Context,
    Add,
    Delete,
}

/// One line of a hunk, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub content: String,
    pub kind: DiffLineKind,
}

/// A single hunk (contiguous block of changes plus context)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// `@@ -<oldStart>,<oldLen> +<newStart>,<newLen> @@`
    pub header: String,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: usize,
    pub deleted: usize,
}

impl DiffStats {
    pub fn total_changes(&self) -> usize {
        self.added + self.deleted
    }

    pub fn net_change(&self) -> isize {
        self.added as isize - self.deleted as isize
    }
}

/// Outcome of diffing one path.
///
/// When `available` is false there are no hunks and `error` says why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub available: bool,
    pub hunks: Vec<DiffHunk>,
    pub stats: DiffStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiffResult {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            hunks: Vec::new(),
            stats: DiffStats::default(),
            error: Some(reason.into()),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Line differ built on a longest-common-subsequence alignment.
#[derive(Debug, Clone, Copy)]
pub struct LineDiffer {
    context_lines: usize,
}

impl Default for LineDiffer {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LINES)
    }
}

impl LineDiffer {
    pub fn new(context_lines: usize) -> Self {
        Self { context_lines }
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Diff `old` against `new`. Identical inputs give an unavailable
    /// result with reason `"no changes"`.
    pub fn diff(&self, old: &str, new: &str) -> DiffResult {
        let diff = TextDiff::configure()
            .algorithm(Algorithm::Lcs)
            .diff_lines(old, new);

        let mut hunks = Vec::new();
        let mut stats = DiffStats::default();

        for group in diff.grouped_ops(self.context_lines) {
            let (first, last) = match (group.first(), group.last()) {
                (Some(first), Some(last)) => (first, last),
                _ => continue,
            };

            let old_start = first.old_range().start;
            let new_start = first.new_range().start;
            let old_len = last.old_range().end - old_start;
            let new_len = last.new_range().end - new_start;

            let mut lines = Vec::new();
            for op in &group {
                for change in diff.iter_changes(op) {
                    let kind = match change.tag() {
                        ChangeTag::Equal => DiffLineKind::Context,
                        ChangeTag::Insert => {
                            stats.added += 1;
                            DiffLineKind::Add
                        }
                        ChangeTag::Delete => {
                            stats.deleted += 1;
                            DiffLineKind::Delete
                        }
                    };
                    lines.push(DiffLine {
                        content: strip_line_ending(change.value()).to_string(),
                        kind,
                    });
                }
            }

            hunks.push(DiffHunk {
                header: hunk_header(old_start, old_len, new_start, new_len),
                lines,
            });
        }

        if hunks.is_empty() {
            return DiffResult::unavailable("no changes");
        }

        DiffResult {
            available: true,
            hunks,
            stats,
            error: None,
        }
    }
}

/// Unified-diff header. Starts are 1-based; an empty range points at the
/// line before it, so a pure insertion at the top reads `-0,0`.
fn hunk_header(old_start: usize, old_len: usize, new_start: usize, new_len: usize) -> String {
    let display = |start: usize, len: usize| if len == 0 { start } else { start + 1 };
    format!(
        "@@ -{},{} +{},{} @@",
        display(old_start, old_len),
        old_len,
        display(new_start, new_len),
        new_len
    )
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
