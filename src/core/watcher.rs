use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::debounce::Coalescer;
use super::events::{FileEvent, Operation};
use super::filter::PathFilter;
use crate::config::WatcherConfig;

/// Watches a directory tree and turns raw notifications into coalesced
/// [`FileEvent`]s on the output queue.
///
/// Subscriptions are registered per directory so filtered subtrees such as
/// `node_modules` never cost a watch. Directories created while running are
/// registered as they appear.
pub struct Watcher {
    root: PathBuf,
    filter: Arc<PathFilter>,
    coalescer: Coalescer,
    fs_watcher: RecommendedWatcher,
    raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    watched_dirs: HashSet<PathBuf>,
    // Directories dropped after a delete or rename. Later notifications for
    // the same path are still about the directory, until it is recreated.
    retired_dirs: HashSet<PathBuf>,
    shutdown: Arc<Notify>,
}

/// Stops a running [`Watcher`] from another task or thread.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    shutdown: Arc<Notify>,
}

impl WatcherHandle {
    /// Ask the run loop to exit. Safe to call more than once, and before the
    /// loop has started.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}

impl Watcher {
    /// Set up the subscription for `root` and walk it.
    ///
    /// Must be called from within a tokio runtime: debounce timers are
    /// spawned on it.
    pub fn new<P: AsRef<Path>>(
        root: P,
        events: mpsc::Sender<FileEvent>,
        config: &WatcherConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .context("Watcher must be created inside a tokio runtime")?;

        let root = root.as_ref();
        if !root.is_dir() {
            bail!("Watch root is not a directory: {}", root.display());
        }
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let fs_watcher = notify::recommended_watcher(move |res| {
            // The receiver only goes away once the watcher is shutting down.
            let _ = raw_tx.send(res);
        })
        .context("Failed to create file system watcher")?;

        let mut watcher = Self {
            filter: Arc::new(PathFilter::new(&config.filters)),
            coalescer: Coalescer::new(runtime, events, config.debounce_duration()),
            root: root.clone(),
            fs_watcher,
            raw_rx,
            watched_dirs: HashSet::new(),
            retired_dirs: HashSet::new(),
            shutdown: Arc::new(Notify::new()),
        };

        watcher.register_tree(&root);

        tracing::info!(
            "Watching {} ({} directories, debounce {:?})",
            root.display(),
            watcher.watched_dirs.len(),
            watcher.coalescer.debounce()
        );

        Ok(watcher)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn handle(&self) -> WatcherHandle {
        WatcherHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    pub fn is_watching<P: AsRef<Path>>(&self, dir: P) -> bool {
        self.watched_dirs.contains(dir.as_ref())
    }

    /// Registered directories, sorted.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.watched_dirs.iter().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Spawn the run loop on the current runtime.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consume notifications until closed or until the notification source
    /// goes away. Dropping `self` at the end releases the OS subscription.
    pub async fn run(mut self) {
        let shutdown = Arc::clone(&self.shutdown);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::debug!("Watcher for {} closed", self.root.display());
                    break;
                }
                raw = self.raw_rx.recv() => match raw {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(err)) => tracing::warn!("File watcher error: {}", err),
                    None => break,
                },
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        let folder_hint = matches!(
            event.kind,
            EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
        );

        for (path, op) in translate(&event) {
            match op {
                Operation::Create => {
                    self.retired_dirs.remove(&path);
                    if folder_hint || path.is_dir() {
                        self.register_tree(&path);
                        continue;
                    }
                }
                Operation::Delete | Operation::Rename if folder_hint || self.is_known_dir(&path) => {
                    self.forget_tree(&path);
                    continue;
                }
                _ => {}
            }

            let rel = relative_path(&self.root, &path);
            if rel.is_empty() || self.filter.is_filtered(&rel) {
                tracing::trace!("Filtered {}", rel);
                continue;
            }

            self.coalescer.push(FileEvent::new(rel, op));
        }
    }

    fn is_known_dir(&self, path: &Path) -> bool {
        self.watched_dirs.contains(path) || self.retired_dirs.contains(path)
    }

    /// Drop `dir` and every watched directory below it. A renamed directory
    /// keeps its OS watch under the old name, so the subscription is released
    /// here and the new name is registered when its creation arrives.
    fn forget_tree(&mut self, dir: &Path) {
        let gone: Vec<PathBuf> = self
            .watched_dirs
            .iter()
            .filter(|watched| watched.starts_with(dir))
            .cloned()
            .collect();

        for path in gone {
            self.watched_dirs.remove(&path);
            if let Err(err) = self.fs_watcher.unwatch(&path) {
                tracing::trace!("Unwatch {}: {}", path.display(), err);
            }
            self.retired_dirs.insert(path);
        }

        self.retired_dirs.insert(dir.to_path_buf());
        tracing::debug!("Stopped watching {}", dir.display());
    }

    /// Register `dir` and every unfiltered directory below it.
    fn register_tree(&mut self, dir: &Path) {
        let rel = relative_path(&self.root, dir);
        if !rel.is_empty() && self.filter.is_filtered(&format!("{}/", rel)) {
            tracing::debug!("Not watching filtered directory {}", rel);
            return;
        }

        let filter = Arc::clone(&self.filter);
        let root = self.root.clone();

        let walker = WalkBuilder::new(dir)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
                !is_dir || !filter.is_filtered(&format!("{}/", relative_path(&root, entry.path())))
            })
            .build();

        for result in walker {
            match result {
                Ok(entry) => {
                    if entry.file_type().map_or(false, |ft| ft.is_dir()) {
                        self.watch_dir(entry.path());
                    }
                }
                Err(err) => {
                    tracing::debug!("Skipping unreadable entry: {}", err);
                }
            }
        }
    }

    fn watch_dir(&mut self, dir: &Path) {
        match self.fs_watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::trace!("Watching directory {}", dir.display());
                self.retired_dirs.remove(dir);
                self.watched_dirs.insert(dir.to_path_buf());
            }
            Err(err) => {
                tracing::warn!("Cannot watch {}: {}", dir.display(), err);
            }
        }
    }
}

/// Map a raw notification to the operations it implies for each path.
///
/// A rename destination is reported as a creation, since the entry appears
/// under that name. The paired `Both` form is dropped so one rename yields
/// one raw event per side. Metadata changes and access events carry no content
/// change and are dropped.
pub fn translate(event: &Event) -> Vec<(PathBuf, Operation)> {
    let single = |op: Operation| -> Vec<(PathBuf, Operation)> {
        event.paths.iter().map(|path| (path.clone(), op)).collect()
    };

    match &event.kind {
        EventKind::Create(_) => single(Operation::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(Operation::Create),
        // Backends that pair a rename also report each side on its own.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => single(Operation::Rename),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => single(Operation::Modify),
        EventKind::Remove(_) => single(Operation::Delete),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// `path` relative to `root`, joined with `/`. Falls back to the full path
/// when `path` is not under `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .filter_map(|comp| match comp {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}
