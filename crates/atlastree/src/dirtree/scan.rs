//! Background listing worker for the raw directory tree.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::{fs, io};

use log::{debug, warn};
use parking_lot::RwLock;

use super::data::{DirEntryInfo, DirTreeData};
use crate::events::{EventHub, ModelEvent};

/// Handle to one generation of the scanning worker.
///
/// Dropping the handle cancels the worker and waits for it to stop, so two
/// generations can never run against the same subscriber set at once.
#[derive(Debug)]
pub(crate) struct Scanner {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Scanner {
    /// Spawns a worker that lists the whole tree under the root of `data`,
    /// emitting [`ModelEvent::DirectoryLoaded`] per completed directory.
    ///
    /// Emissions are suppressed once `current_epoch` moves past `epoch`.
    pub(crate) fn spawn(
        data: Arc<RwLock<DirTreeData>>,
        events: EventHub,
        epoch: u32,
        current_epoch: Arc<AtomicU32>,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();
        let handle =
            thread::spawn(move || scan_worker(&data, &events, epoch, &current_epoch, &cancel_flag));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancels the worker and blocks until it has fully stopped.
    pub(crate) fn cancel_and_join(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}

fn scan_worker(
    data: &RwLock<DirTreeData>,
    events: &EventHub,
    epoch: u32,
    current_epoch: &AtomicU32,
    cancel: &AtomicBool,
) {
    let root = data.read().root();
    let mut queue = vec![root];
    while let Some(dir) = queue.pop() {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let target = {
            let guard = data.read();
            guard
                .node(dir)
                .filter(|node| node.is_dir)
                .map(|node| node.path.clone())
        };
        let Some(path) = target else {
            continue;
        };

        match list_directory(&path) {
            Ok(entries) => {
                let added = data.write().apply_listing(dir, entries);
                queue.extend(added);
                if current_epoch.load(Ordering::Relaxed) == epoch {
                    events.emit(ModelEvent::DirectoryLoaded(path));
                }
            }
            Err(error) => {
                warn!("listing {} failed: {error}", path.display());
                data.write().mark_failed(dir);
            }
        }
    }
    debug!("directory scan complete (epoch {epoch})");
}

/// Lists one directory, sorted by name for deterministic child order.
pub(crate) fn list_directory(path: &Path) -> io::Result<Vec<DirEntryInfo>> {
    let mut entries: Vec<DirEntryInfo> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                is_dir,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
