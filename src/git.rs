//! Version-control baselines.
//!
//! The diff engine only needs two things from a repository: the committed
//! content of a path and the ignore patterns to seed the path filter.
//! [`GitRepo`] provides them from a real repository, [`NoBaseline`] is the
//! stand-in when there is none.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use git2::Repository;

/// Where first-sighting baselines come from.
pub trait BaselineSource: Send + Sync {
    /// Committed content of `path` (relative to the watch root), if any.
    fn fetch_baseline(&self, path: &str) -> Option<String>;

    /// Exclude patterns to feed into the path filter.
    fn ignore_patterns(&self) -> Vec<String>;
}

/// No repository: nothing is tracked and nothing is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBaseline;

impl BaselineSource for NoBaseline {
    fn fetch_baseline(&self, _path: &str) -> Option<String> {
        None
    }

    fn ignore_patterns(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Git repository enclosing the watch root.
pub struct GitRepo {
    repo: Mutex<Repository>,
    workdir: PathBuf,
    /// Watch root relative to the work tree.
    prefix: PathBuf,
}

impl GitRepo {
    /// Find the repository containing `root`. Returns `None` when `root` is
    /// not inside a work tree.
    pub fn discover<P: AsRef<Path>>(root: P) -> Option<Self> {
        let root = root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let repo = match Repository::discover(&root) {
            Ok(repo) => repo,
            Err(err) => {
                tracing::debug!("No git repository at {}: {}", root.display(), err.message());
                return None;
            }
        };

        let workdir = repo.workdir()?;
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
        let prefix = root
            .strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Some(Self {
            repo: Mutex::new(repo),
            workdir,
            prefix,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Short branch name, or the abbreviated commit id on a detached HEAD.
    pub fn branch(&self) -> Option<String> {
        let repo = self.lock();
        let head = repo.head().ok()?;

        if head.is_branch() {
            head.shorthand().map(str::to_string)
        } else {
            head.target().map(|oid| oid.to_string().chars().take(7).collect())
        }
    }

    fn head_content(&self, path: &str) -> Result<String, git2::Error> {
        let repo = self.lock();
        let tree = repo.head()?.peel_to_tree()?;
        let entry = tree.get_path(&self.prefix.join(path))?;
        let blob = entry.to_object(&repo)?.peel_to_blob()?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    fn lock(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BaselineSource for GitRepo {
    fn fetch_baseline(&self, path: &str) -> Option<String> {
        match self.head_content(path) {
            Ok(content) => Some(content),
            Err(err) => {
                tracing::debug!("No HEAD baseline for {}: {}", path, err.message());
                None
            }
        }
    }

    fn ignore_patterns(&self) -> Vec<String> {
        let text = match std::fs::read_to_string(self.workdir.join(".gitignore")) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };

        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }
}
