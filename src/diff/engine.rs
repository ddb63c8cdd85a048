use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::algorithms::{DiffResult, LineDiffer};
use crate::git::{BaselineSource, NoBaseline};

/// Last observed content per relative path.
#[derive(Debug, Default)]
pub struct BaselineStore {
    entries: HashMap<String, String>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Store `content` for `path`, returning what was there before.
    pub fn insert(&mut self, path: &str, content: String) -> Option<String> {
        self.entries.insert(path.to_string(), content)
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Diffs files under a root against their baseline.
///
/// The first time a path is seen its baseline comes from the
/// [`BaselineSource`] (git HEAD); after that it is whatever this engine last
/// read from disk. Every call leaves the baseline equal to the current disk
/// content, or removes it when the file is gone.
///
/// The baseline map has its own lock, so one engine can serve several
/// consumers.
pub struct DiffEngine {
    root: PathBuf,
    source: Box<dyn BaselineSource>,
    differ: LineDiffer,
    baselines: Mutex<BaselineStore>,
}

impl DiffEngine {
    pub fn new<P, S>(root: P, source: S) -> Self
    where
        P: AsRef<Path>,
        S: BaselineSource + 'static,
    {
        Self {
            root: root.as_ref().to_path_buf(),
            source: Box::new(source),
            differ: LineDiffer::default(),
            baselines: Mutex::new(BaselineStore::new()),
        }
    }

    /// Engine with no version-control baseline: first sightings diff
    /// against empty content.
    pub fn without_baseline<P: AsRef<Path>>(root: P) -> Self {
        Self::new(root, NoBaseline)
    }

    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.differ = LineDiffer::new(context_lines);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn baseline_count(&self) -> usize {
        self.lock().len()
    }

    pub fn baseline(&self, path: &str) -> Option<String> {
        self.lock().get(path).map(str::to_string)
    }

    /// Drop every stored baseline.
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Diff the current content of `path` (relative to the root) against
    /// its baseline. Never fails: problems come back as an unavailable
    /// result with a reason.
    pub fn diff(&self, path: &str) -> DiffResult {
        let bytes = match std::fs::read(self.root.join(path)) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!("Cannot read {}: {}", path, err);
                return self.diff_missing(path);
            }
        };

        if bytes.contains(&0) {
            return DiffResult::unavailable("binary file");
        }

        let current = String::from_utf8_lossy(&bytes).into_owned();
        let previous = self.lock().insert(path, current.clone());

        match previous {
            Some(previous) if previous == current => DiffResult::unavailable("no changes"),
            Some(previous) => self.differ.diff(&previous, &current),
            None => match self.source.fetch_baseline(path) {
                Some(head) if head == current => DiffResult::unavailable("no changes"),
                Some(head) => self.differ.diff(&head, &current),
                None => self.differ.diff("", &current),
            },
        }
    }

    fn diff_missing(&self, path: &str) -> DiffResult {
        let previous = self.lock().remove(path);
        match previous {
            Some(previous) if !previous.is_empty() => self.differ.diff(&previous, ""),
            _ => DiffResult::unavailable("file not readable"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BaselineStore> {
        self.baselines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
