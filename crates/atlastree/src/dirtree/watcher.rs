//! Filesystem watching for the raw directory tree.
//!
//! Change events under the bound root re-list the affected directory (and
//! any directories that listing introduces) through the same arena and event
//! channel the scanner uses. The notify callback runs on the watcher's own
//! thread; everything it touches is behind the shared lock or the event hub,
//! so delivery off the owning thread is safe.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;

use super::data::DirTreeData;
use super::scan::list_directory;
use crate::error::{AtlasTreeError, Result};
use crate::events::{EventHub, ModelEvent};

/// Creates a watcher over `root` that refreshes changed directories.
///
/// Refreshes and emissions stop as soon as `current_epoch` moves past
/// `epoch`, so a superseded generation goes quiet even while its watcher is
/// being torn down.
pub(crate) fn spawn_dir_watcher(
    root: PathBuf,
    data: Arc<RwLock<DirTreeData>>,
    events: EventHub,
    epoch: u32,
    current_epoch: Arc<AtomicU32>,
) -> Result<RecommendedWatcher> {
    let watch_target = root.clone();
    let mut watcher = recommended_watcher(move |event_result: notify::Result<Event>| {
        match event_result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                if current_epoch.load(Ordering::Relaxed) != epoch {
                    return;
                }
                for dir in affected_directories(&root, &event.paths) {
                    refresh_directory(&data, &events, epoch, &current_epoch, &dir);
                }
            }
            Err(error) => warn!("directory watch error: {error}"),
        }
    })
    .map_err(|error| {
        AtlasTreeError::Watch(format!(
            "failed to create watcher for {}: {error}",
            watch_target.display()
        ))
    })?;

    watcher
        .watch(&watch_target, RecursiveMode::Recursive)
        .map_err(|error| {
            AtlasTreeError::Watch(format!(
                "failed to watch {}: {error}",
                watch_target.display()
            ))
        })?;

    Ok(watcher)
}

/// Maps changed paths to the directories whose listings must be refreshed.
///
/// A change to an entry means its containing directory's listing changed;
/// a change to the root refreshes the root itself.
fn affected_directories(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for path in paths {
        let dir = if path == root {
            root.to_path_buf()
        } else {
            match path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => continue,
            }
        };
        if !dir.starts_with(root) {
            continue;
        }
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Re-lists `dir` and any pending directories its listing introduces.
fn refresh_directory(
    data: &RwLock<DirTreeData>,
    events: &EventHub,
    epoch: u32,
    current_epoch: &AtomicU32,
    dir: &Path,
) {
    let mut queue: Vec<_> = data.read().index_for_path(dir).into_iter().collect();
    while let Some(id) = queue.pop() {
        if current_epoch.load(Ordering::Relaxed) != epoch {
            return;
        }
        let target = {
            let guard = data.read();
            guard
                .node(id)
                .filter(|node| node.is_dir)
                .map(|node| node.path.clone())
        };
        let Some(path) = target else {
            continue;
        };

        match list_directory(&path) {
            Ok(entries) => {
                let added = data.write().apply_listing(id, entries);
                queue.extend(added);
                if current_epoch.load(Ordering::Relaxed) == epoch {
                    events.emit(ModelEvent::DirectoryLoaded(path));
                }
            }
            Err(error) => {
                debug!("re-listing {} failed: {error}", path.display());
                data.write().mark_failed(id);
            }
        }
    }
}
