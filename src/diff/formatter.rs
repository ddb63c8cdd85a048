use super::algorithms::{DiffLineKind, DiffResult};

/// Renders diff results as text for console output.
pub struct DiffFormatter;

impl DiffFormatter {
    /// Unified diff body: `--- path` / `+++ path` headers, then every hunk.
    /// Unavailable results render as a single `(reason)` line.
    pub fn format_unified(result: &DiffResult, path: &str) -> String {
        if !result.available {
            return format!("({})", result.error().unwrap_or("diff unavailable"));
        }

        let mut output = Vec::new();
        output.push(format!("--- {}", path));
        output.push(format!("+++ {}", path));

        for hunk in &result.hunks {
            output.push(hunk.header.clone());
            for line in &hunk.lines {
                output.push(format!("{}{}", Self::prefix(line.kind), line.content));
            }
        }

        output.join("\n")
    }

    /// Like [`format_unified`](Self::format_unified) with ANSI colors and at
    /// most `max_lines` hunk lines.
    pub fn format_colored(result: &DiffResult, max_lines: usize) -> Vec<String> {
        let mut output = Vec::new();
        let mut shown = 0;

        for hunk in &result.hunks {
            if shown >= max_lines {
                break;
            }
            output.push(format!("\x1b[36m{}\x1b[0m", hunk.header));
            for line in &hunk.lines {
                if shown >= max_lines {
                    break;
                }
                let prefix = Self::prefix(line.kind);
                output.push(match line.kind {
                    DiffLineKind::Add => format!("\x1b[32m{}{}\x1b[0m", prefix, line.content),
                    DiffLineKind::Delete => format!("\x1b[31m{}{}\x1b[0m", prefix, line.content),
                    DiffLineKind::Context => format!("{}{}", prefix, line.content),
                });
                shown += 1;
            }
        }

        let total: usize = result.hunks.iter().map(|h| h.lines.len()).sum();
        if total > shown {
            output.push(format!("... {} more lines", total - shown));
        }

        output
    }

    /// `+3 -1` style summary.
    pub fn format_stats(result: &DiffResult) -> String {
        format!("+{} -{}", result.stats.added, result.stats.deleted)
    }

    fn prefix(kind: DiffLineKind) -> char {
        match kind {
            DiffLineKind::Context => ' ',
            DiffLineKind::Add => '+',
            DiffLineKind::Delete => '-',
        }
    }
}
