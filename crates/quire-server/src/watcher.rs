//! Directory watching for live rebuilds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;
use walkdir::WalkDir;

use crate::server::ServerError;

/// Kind of change observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Created,
    Modified,
    Removed,
}

/// A filesystem change under the watched tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub paths: Vec<PathBuf>,
}

struct Shared {
    watcher: Mutex<RecommendedWatcher>,
    watched: Mutex<BTreeSet<PathBuf>>,
}

impl Shared {
    fn add(&self, dir: &Path) {
        let mut watched = lock(&self.watched);
        if watched.contains(dir) {
            return;
        }
        match lock(&self.watcher).watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::debug!("Watching {}", dir.display());
                watched.insert(dir.to_path_buf());
            }
            Err(e) => tracing::warn!("Failed to watch {}: {}", dir.display(), e),
        }
    }

    fn add_tree(&self, root: &Path) {
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_dir() {
                self.add(entry.path());
            }
        }
    }

    fn remove(&self, path: &Path) {
        let mut watched = lock(&self.watched);
        let gone: Vec<PathBuf> = watched
            .iter()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();

        let mut watcher = lock(&self.watcher);
        for dir in gone {
            // The kernel may already have dropped the watch with the directory.
            if let Err(e) = watcher.unwatch(&dir) {
                tracing::debug!("Unwatch {}: {}", dir.display(), e);
            }
            watched.remove(&dir);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Non-recursive watches over every directory of a source tree.
///
/// Directories created later are added as their creation is seen; removed
/// paths are dropped from the set.
pub struct WatchSet {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for WatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSet")
            .field("watched", &*lock(&self.shared.watched))
            .finish()
    }
}

impl WatchSet {
    /// Watch `root` and every directory below it.
    ///
    /// Returns the set and a channel of changes. The channel closes when
    /// the set is dropped.
    pub fn new(root: &Path) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), ServerError> {
        if !root.is_dir() {
            return Err(ServerError::Watch(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| match res {
            Ok(event) => {
                let _ = sync_tx.send(event);
            }
            Err(e) => tracing::warn!("Watch error: {}", e),
        })
        .map_err(|e| ServerError::Watch(e.to_string()))?;

        let shared = Arc::new(Shared {
            watcher: Mutex::new(watcher),
            watched: Mutex::new(BTreeSet::new()),
        });

        shared.add_tree(root);

        let forward = Arc::downgrade(&shared);
        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                let Some(kind) = classify(&event.kind) else {
                    continue;
                };
                let Some(shared) = forward.upgrade() else {
                    break;
                };

                for path in &event.paths {
                    match kind {
                        WatchKind::Created if path.is_dir() => shared.add_tree(path),
                        WatchKind::Removed => shared.remove(path),
                        _ => {}
                    }
                }
                drop(shared);

                let change = WatchEvent {
                    kind,
                    paths: event.paths,
                };
                if async_tx.blocking_send(change).is_err() {
                    break;
                }
            }
        });

        Ok((Self { shared }, async_rx))
    }

    /// Directories currently watched.
    pub fn watched(&self) -> Vec<PathBuf> {
        lock(&self.shared.watched).iter().cloned().collect()
    }
}

fn classify(kind: &EventKind) -> Option<WatchKind> {
    match kind {
        EventKind::Create(_) => Some(WatchKind::Created),
        EventKind::Modify(_) => Some(WatchKind::Modified),
        EventKind::Remove(_) => Some(WatchKind::Removed),
        _ => None,
    }
}
