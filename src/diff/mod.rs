//! Diff generation and formatting module
//!
//! [`LineDiffer`] turns two texts into hunks of context/add/delete lines,
//! [`DiffEngine`] decides which two texts to compare for a watched path, and
//! [`DiffFormatter`] renders the result for the console.

pub mod algorithms;
pub mod engine;
pub mod formatter;

// Re-export the main types for easier use
pub use algorithms::{
    DiffHunk, DiffLine, DiffLineKind, DiffResult, DiffStats, LineDiffer, DEFAULT_CONTEXT_LINES,
};
pub use engine::{BaselineStore, DiffEngine};
pub use formatter::DiffFormatter;

/// Convenience function to diff two texts with default settings
pub fn diff_text(old: &str, new: &str) -> DiffResult {
    LineDiffer::default().diff(old, new)
}

/// Convenience function to get diff statistics
pub fn get_diff_stats(old: &str, new: &str) -> DiffStats {
    diff_text(old, new).stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convenience_functions() {
        let old = "line1\nline2\nline3";
        let new = "line1\nmodified\nline3";

        let result = diff_text(old, new);
        assert!(result.available);

        let stats = get_diff_stats(old, new);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.deleted, 1);
    }
}
