//! The filtered, positionally-addressed overlay over the raw directory tree.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{debug, warn};
use notify::RecommendedWatcher;
use parking_lot::RwLock;

use super::data::DirTreeData;
use super::filter::FilterState;
use super::scan::Scanner;
use super::watcher::spawn_dir_watcher;
use crate::arena::SlotIndex;
use crate::events::{EventHub, ModelEvent};
use crate::model::{TreeModel, HEADERS};
use crate::position::{next_epoch, Position};

/// Everything bound to one root generation.
struct Bound {
    filter: FilterState,
    data: Arc<RwLock<DirTreeData>>,
    scanner: Scanner,
    watcher: Option<RecommendedWatcher>,
}

/// A live-filtered view over an asynchronously-populated directory tree.
///
/// The view owns no mirror of the filtered set: every navigation call
/// re-derives visible children from the raw arena, so results always reflect
/// the current (possibly still-loading) state of the scan. This bounds
/// scalability to small directory fan-outs, which is the intended regime.
///
/// The invalid position denotes the virtual parent of the bound root; the
/// root itself is addressable (it is what [`set_root`](Self::set_root)
/// returns). A directory that cannot be listed, or has not been listed yet,
/// reports zero visible children so the caller can retry expansion later.
pub struct FilteredDirTree {
    state: Option<Bound>,
    events: EventHub,
    epoch: u32,
    current_epoch: Arc<AtomicU32>,
}

impl Default for FilteredDirTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FilteredDirTree {
    pub fn new() -> Self {
        Self {
            state: None,
            events: EventHub::new(),
            epoch: 0,
            current_epoch: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Registers a subscriber for [`ModelEvent::DirectoryLoaded`]
    /// notifications. Subscriptions survive rebinds.
    pub fn subscribe(&self) -> Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Binds the view to `root` with the given admitted dataset names,
    /// returning the root's position.
    ///
    /// The previous generation is torn down first (its epoch is retired,
    /// its watcher dropped and its scanner joined) before the new scan
    /// starts, so notifications from the old root all arrive before any
    /// notification from the new one. Every position minted under the old
    /// root is dead afterwards.
    pub fn set_root(&mut self, root: impl Into<PathBuf>, datasets: &[String]) -> Position {
        let root = root.into();

        self.epoch = next_epoch(self.epoch);
        self.current_epoch.store(self.epoch, Ordering::Relaxed);
        if let Some(mut bound) = self.state.take() {
            drop(bound.watcher.take());
            bound.scanner.cancel_and_join();
        }

        debug!(
            "binding directory view to {} (epoch {})",
            root.display(),
            self.epoch
        );
        let filter = FilterState::new(root.clone(), datasets);
        let data = Arc::new(RwLock::new(DirTreeData::new(root.clone())));
        let root_id = data.read().root();
        let scanner = Scanner::spawn(
            data.clone(),
            self.events.clone(),
            self.epoch,
            self.current_epoch.clone(),
        );
        let watcher = match spawn_dir_watcher(
            root,
            data.clone(),
            self.events.clone(),
            self.epoch,
            self.current_epoch.clone(),
        ) {
            Ok(watcher) => Some(watcher),
            Err(error) => {
                warn!("directory watching disabled: {error}");
                None
            }
        };

        self.state = Some(Bound {
            filter,
            data,
            scanner,
            watcher,
        });
        Position::new(root_id, 0, self.epoch)
    }

    /// Number of visible children under `parent`.
    ///
    /// The invalid position counts the root itself (0 or 1).
    pub fn row_count(&self, parent: Position) -> usize {
        let Some(bound) = &self.state else {
            return 0;
        };
        let data = bound.data.read();
        if !parent.is_valid() {
            return usize::from(node_visible(&bound.filter, &data, data.root()));
        }
        match self.live(&data, parent) {
            Some(id) => visible_children(&bound.filter, &data, id).len(),
            None => 0,
        }
    }

    /// The `row`-th visible child of `parent`, or invalid when out of range.
    pub fn child(&self, parent: Position, row: usize) -> Position {
        let Some(bound) = &self.state else {
            return Position::INVALID;
        };
        let data = bound.data.read();
        if !parent.is_valid() {
            let root = data.root();
            if row == 0 && node_visible(&bound.filter, &data, root) {
                return self.position(root);
            }
            return Position::INVALID;
        }
        let Some(id) = self.live(&data, parent) else {
            return Position::INVALID;
        };
        visible_children(&bound.filter, &data, id)
            .get(row)
            .map_or(Position::INVALID, |&child| self.position(child))
    }

    /// The parent position of `pos`; invalid for the root itself.
    pub fn parent(&self, pos: Position) -> Position {
        let Some(bound) = &self.state else {
            return Position::INVALID;
        };
        let data = bound.data.read();
        let Some(id) = self.live(&data, pos) else {
            return Position::INVALID;
        };
        match data.node(id).and_then(|node| node.parent.to_option()) {
            Some(parent) => self.position(parent),
            None => Position::INVALID,
        }
    }

    /// Resolves an absolute path to its current visible position.
    ///
    /// Invalid when the path is unknown to the scan so far, filtered out, or
    /// reached only through filtered-out ancestors.
    pub fn lookup(&self, path: impl AsRef<Path>) -> Position {
        let Some(bound) = &self.state else {
            return Position::INVALID;
        };
        let data = bound.data.read();
        let Some(id) = data.index_for_path(path.as_ref()) else {
            return Position::INVALID;
        };

        // Every hop up to the root must itself be visible.
        let mut current = id;
        loop {
            let Some(node) = data.node(current) else {
                return Position::INVALID;
            };
            if !bound.filter.is_visible(&node.path, &node.name, node.is_dir) {
                return Position::INVALID;
            }
            match node.parent.to_option() {
                Some(parent) => current = parent,
                None if current == data.root() => break,
                None => return Position::INVALID,
            }
        }
        self.position(id)
    }

    /// The entry name at `pos`.
    pub fn name(&self, pos: Position) -> Option<String> {
        let bound = self.state.as_ref()?;
        let data = bound.data.read();
        let id = self.live(&data, pos)?;
        data.node(id).map(|node| node.name.clone())
    }

    /// The absolute path at `pos`.
    pub fn path(&self, pos: Position) -> Option<PathBuf> {
        let bound = self.state.as_ref()?;
        let data = bound.data.read();
        let id = self.live(&data, pos)?;
        data.node(id).map(|node| node.path.clone())
    }

    /// The currently bound root path.
    pub fn root_path(&self) -> Option<&Path> {
        self.state.as_ref().map(|bound| bound.filter.root())
    }

    fn position(&self, id: SlotIndex) -> Position {
        Position::new(id, 0, self.epoch)
    }

    /// Epoch- and reachability-checks a minted position.
    fn live(&self, data: &DirTreeData, pos: Position) -> Option<SlotIndex> {
        if !pos.is_valid() || pos.epoch() != self.epoch {
            return None;
        }
        data.is_reachable(pos.index()).then(|| pos.index())
    }
}

impl TreeModel for FilteredDirTree {
    fn column_count(&self) -> usize {
        HEADERS.len()
    }

    fn row_count(&self, parent: Position) -> usize {
        FilteredDirTree::row_count(self, parent)
    }

    fn child(&self, parent: Position, row: usize) -> Position {
        FilteredDirTree::child(self, parent, row)
    }

    fn parent(&self, pos: Position) -> Position {
        FilteredDirTree::parent(self, pos)
    }

    fn data(&self, pos: Position, column: usize) -> Option<String> {
        match column {
            0 => self.name(pos),
            _ => None,
        }
    }

    fn header(&self, section: usize) -> Option<&'static str> {
        HEADERS.get(section).copied()
    }
}

fn node_visible(filter: &FilterState, data: &DirTreeData, id: SlotIndex) -> bool {
    data.node(id)
        .is_some_and(|node| filter.is_visible(&node.path, &node.name, node.is_dir))
}

/// Re-derives the visible subset of a directory's children.
fn visible_children(filter: &FilterState, data: &DirTreeData, id: SlotIndex) -> Vec<SlotIndex> {
    let Some(node) = data.node(id) else {
        return Vec::new();
    };
    node.children
        .iter()
        .copied()
        .filter(|&child| node_visible(filter, data, child))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Blocks until the scanner reports `path` as listed.
    fn wait_for_dir(rx: &Receiver<ModelEvent>, path: &Path) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(ModelEvent::DirectoryLoaded(loaded)) if loaded.as_path() == path => return,
                Ok(_) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(error) => panic!("event channel closed: {error}"),
            }
        }
        panic!("timed out waiting for {} to load", path.display());
    }

    fn visible_names(view: &FilteredDirTree, parent: Position) -> Vec<String> {
        (0..view.row_count(parent))
            .map(|row| view.name(view.child(parent, row)).unwrap())
            .collect()
    }

    /// Root with a reserved dir, a plain dir, a dataset dir and a file.
    fn session_fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("S_1")).unwrap();
        fs::create_dir(temp.path().join("other")).unwrap();
        fs::create_dir(temp.path().join("DatasetA")).unwrap();
        File::create(temp.path().join("data.txt")).unwrap();
        temp
    }

    #[test]
    fn filters_children_to_datasets_and_reserved_dirs() {
        let temp = session_fixture();
        let mut view = FilteredDirTree::new();
        let events = view.subscribe();
        let root = view.set_root(temp.path(), &["DatasetA".to_string()]);
        wait_for_dir(&events, temp.path());

        assert_eq!(visible_names(&view, root), vec!["DatasetA", "S_1"]);
        assert_eq!(view.row_count(Position::INVALID), 1);
        assert_eq!(view.child(Position::INVALID, 0), root);
        assert_eq!(view.child(Position::INVALID, 1), Position::INVALID);
    }

    #[test]
    fn lookup_resolves_visible_paths_only() {
        let temp = session_fixture();
        let mut view = FilteredDirTree::new();
        let events = view.subscribe();
        let root = view.set_root(temp.path(), &["DatasetA".to_string()]);
        wait_for_dir(&events, temp.path());

        assert_eq!(view.lookup(temp.path()), root);
        assert!(view.lookup(temp.path().join("S_1")).is_valid());
        assert!(view.lookup(temp.path().join("DatasetA")).is_valid());
        assert!(!view.lookup(temp.path().join("other")).is_valid());
        assert!(!view.lookup(temp.path().join("data.txt")).is_valid());
        assert!(!view.lookup(temp.path().join("absent")).is_valid());
    }

    #[test]
    fn nested_reserved_dirs_navigate_with_parent_round_trip() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("S_1/S_2")).unwrap();
        fs::create_dir(temp.path().join("S_1/skipped")).unwrap();

        let mut view = FilteredDirTree::new();
        let events = view.subscribe();
        let root = view.set_root(temp.path(), &[]);
        wait_for_dir(&events, &temp.path().join("S_1"));

        let s1 = view.child(root, 0);
        assert_eq!(view.name(s1).as_deref(), Some("S_1"));
        assert_eq!(visible_names(&view, s1), vec!["S_2"]);

        let s2 = view.child(s1, 0);
        assert_eq!(view.parent(s2), s1);
        assert_eq!(view.parent(s1), root);
        assert_eq!(view.parent(root), Position::INVALID);
    }

    #[test]
    fn entries_behind_filtered_ancestors_are_unreachable() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("other/S_3")).unwrap();

        let mut view = FilteredDirTree::new();
        let events = view.subscribe();
        view.set_root(temp.path(), &[]);
        wait_for_dir(&events, &temp.path().join("other"));

        assert!(!view.lookup(temp.path().join("other/S_3")).is_valid());
    }

    #[test]
    fn missing_root_reports_zero_children() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone");

        let mut view = FilteredDirTree::new();
        let root = view.set_root(&missing, &[]);
        assert_eq!(view.row_count(Position::INVALID), 0);
        assert_eq!(view.row_count(root), 0);
        assert!(!view.lookup(&missing).is_valid());
    }

    #[test]
    fn rebind_invalidates_old_positions() {
        let first = session_fixture();
        let second = TempDir::new().unwrap();
        fs::create_dir(second.path().join("S_9")).unwrap();

        let mut view = FilteredDirTree::new();
        let events = view.subscribe();
        let old_root = view.set_root(first.path(), &["DatasetA".to_string()]);
        wait_for_dir(&events, first.path());
        let old_child = view.child(old_root, 0);
        assert!(old_child.is_valid());

        let new_root = view.set_root(second.path(), &[]);
        wait_for_dir(&events, second.path());

        assert_eq!(view.row_count(old_root), 0);
        assert_eq!(view.row_count(old_child), 0);
        assert!(!view.lookup(first.path()).is_valid());
        assert_ne!(new_root, old_root);
        assert_eq!(visible_names(&view, new_root), vec!["S_9"]);
    }

    #[test]
    fn stale_generation_events_never_follow_new_ones() {
        let first = session_fixture();
        let second = TempDir::new().unwrap();
        fs::create_dir(second.path().join("S_9")).unwrap();

        let mut view = FilteredDirTree::new();
        let events = view.subscribe();
        view.set_root(first.path(), &[]);
        wait_for_dir(&events, first.path());
        view.set_root(second.path(), &[]);

        // The old generation is joined before `set_root` returns, so every
        // first-root notification must already sit in the buffer ahead of
        // any second-root one.
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen_new = false;
        while Instant::now() < deadline {
            match events.recv_timeout(Duration::from_millis(100)) {
                Ok(ModelEvent::DirectoryLoaded(path)) => {
                    if path.starts_with(second.path()) {
                        seen_new = true;
                        if path == second.path().join("S_9") {
                            break;
                        }
                    } else {
                        assert!(!seen_new, "stale notification after rebind: {path:?}");
                    }
                }
                Ok(_) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(error) => panic!("event channel closed: {error}"),
            }
        }
        assert!(seen_new, "second root never finished loading");

        // A short grace period: nothing from the first root may trail in.
        while let Ok(event) = events.recv_timeout(Duration::from_millis(200)) {
            if let ModelEvent::DirectoryLoaded(path) = event {
                assert!(
                    path.starts_with(second.path()),
                    "stale notification after rebind: {path:?}"
                );
            }
        }
    }

    #[test]
    fn watcher_picks_up_new_directories() {
        let temp = session_fixture();
        let mut view = FilteredDirTree::new();
        let events = view.subscribe();
        let root = view.set_root(temp.path(), &["DatasetA".to_string()]);
        wait_for_dir(&events, temp.path());
        assert_eq!(view.row_count(root), 2);

        fs::create_dir(temp.path().join("S_2")).unwrap();

        // The watcher re-lists the root; poll until the new entry shows up.
        let deadline = Instant::now() + Duration::from_secs(10);
        while view.row_count(root) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(
            visible_names(&view, root),
            vec!["DatasetA", "S_1", "S_2"],
            "watcher did not surface the new directory"
        );
    }

    #[test]
    fn unbound_view_is_empty() {
        let view = FilteredDirTree::new();
        assert_eq!(view.row_count(Position::INVALID), 0);
        assert!(!view.lookup("/anywhere").is_valid());
        assert_eq!(view.root_path(), None);
    }
}
