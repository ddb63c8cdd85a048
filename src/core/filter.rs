use globset::{Glob, GlobMatcher};

/// Directory names that are never watched, wherever they appear in a path.
pub const FILTERED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    ".venv",
    "__pycache__",
    "build",
    "dist",
    ".next",
    ".nuxt",
    "target",
];

/// File names that are never reported.
pub const FILTERED_FILES: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
];

/// Extensions (without the dot) of artifacts and swap files.
pub const FILTERED_EXTENSIONS: &[&str] = &["lock", "pyc", "o", "class", "swp", "swo", "swn"];

/// Name vim creates to probe whether a directory is writable.
const VIM_PROBE_FILE: &str = "4913";

/// Infix used by coding agents for their write-then-rename temp files,
/// e.g. `NOTES.md.tmp.1482378.1771433725085`.
const AGENT_TEMP_MARKER: &str = ".tmp.";

#[derive(Debug, Clone)]
enum ExtraPattern {
    Dir(String),
    Glob(GlobMatcher),
}

/// Decides which relative paths are noise.
///
/// Immutable after construction, so it can be shared freely between the
/// startup walk and the notification loop.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    extra: Vec<ExtraPattern>,
}

impl PathFilter {
    /// Build a filter with additional exclude patterns.
    ///
    /// A pattern ending in `/` excludes any path with a component of that
    /// name. Anything else is a glob matched against the file name. Patterns
    /// that fail to parse are skipped.
    pub fn new<I, S>(extra_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extra = Vec::new();

        for pattern in extra_patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }

            if let Some(dir) = pattern.strip_suffix('/') {
                extra.push(ExtraPattern::Dir(dir.to_string()));
                continue;
            }

            match Glob::new(pattern) {
                Ok(glob) => extra.push(ExtraPattern::Glob(glob.compile_matcher())),
                Err(err) => {
                    tracing::warn!("Ignoring invalid filter pattern {:?}: {}", pattern, err);
                }
            }
        }

        Self { extra }
    }

    pub fn pattern_count(&self) -> usize {
        self.extra.len()
    }

    pub fn is_filtered(&self, path: &str) -> bool {
        let parts: Vec<&str> = path
            .split(|c| c == '/' || c == std::path::MAIN_SEPARATOR)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.iter().any(|part| FILTERED_DIRS.contains(part)) {
            return true;
        }

        let base = match parts.last() {
            Some(base) => *base,
            None => return false,
        };

        if FILTERED_FILES.contains(&base) {
            return true;
        }

        if let Some(ext) = extension(base) {
            if FILTERED_EXTENSIONS.contains(&ext) {
                return true;
            }
        }

        if base.ends_with('~') || base == VIM_PROBE_FILE || base.contains(AGENT_TEMP_MARKER) {
            return true;
        }

        self.extra.iter().any(|pattern| match pattern {
            ExtraPattern::Dir(dir) => parts.iter().any(|part| part == dir),
            ExtraPattern::Glob(matcher) => matcher.is_match(base),
        })
    }
}

/// Text after the last dot, dotfiles included (`.lock` has extension `lock`).
fn extension(name: &str) -> Option<&str> {
    name.rfind('.').map(|idx| &name[idx + 1..])
}
