//! The visibility predicate over raw directory entries.

use std::path::{Path, PathBuf};

use fnv::FnvHashSet;

/// Directories with this name prefix are always visible under the root.
pub const RESERVED_DIR_PREFIX: &str = "S_";

/// The bound root and the set of dataset names admitted under it.
#[derive(Debug, Clone)]
pub struct FilterState {
    root: PathBuf,
    include: FnvHashSet<String>,
}

impl FilterState {
    pub fn new(root: impl Into<PathBuf>, datasets: &[String]) -> Self {
        Self {
            root: root.into(),
            include: datasets.iter().cloned().collect(),
        }
    }

    /// The bound root path.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decides whether a raw entry is exposed through the overlay.
    ///
    /// Files are never visible. The root itself always is; anything else
    /// must live under the root and carry either an admitted dataset name or
    /// the reserved `"S_"` prefix.
    pub fn is_visible(&self, path: &Path, name: &str, is_dir: bool) -> bool {
        if !is_dir {
            return false;
        }
        if path == self.root {
            return true;
        }
        if !path.starts_with(&self.root) {
            return false;
        }
        self.include.contains(name) || name.starts_with(RESERVED_DIR_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> FilterState {
        FilterState::new("/data/session_1", &["DatasetA".to_string()])
    }

    #[test]
    fn files_are_never_visible() {
        let f = filter();
        assert!(!f.is_visible(Path::new("/data/session_1/DatasetA"), "DatasetA", false));
        assert!(!f.is_visible(Path::new("/data/session_1/data.txt"), "data.txt", false));
    }

    #[test]
    fn root_is_always_visible() {
        let f = filter();
        assert!(f.is_visible(Path::new("/data/session_1"), "session_1", true));
    }

    #[test]
    fn admitted_names_and_reserved_prefix() {
        let f = filter();
        assert!(f.is_visible(Path::new("/data/session_1/DatasetA"), "DatasetA", true));
        assert!(f.is_visible(Path::new("/data/session_1/S_0001"), "S_0001", true));
        assert!(!f.is_visible(Path::new("/data/session_1/other"), "other", true));
    }

    #[test]
    fn out_of_root_paths_are_excluded() {
        let f = filter();
        assert!(!f.is_visible(Path::new("/data/session_2/S_0001"), "S_0001", true));
        // A sibling whose name merely extends the root path component.
        assert!(!f.is_visible(Path::new("/data/session_10/S_0001"), "S_0001", true));
    }
}
