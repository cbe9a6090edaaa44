//! The shared directory arena the scanner populates and the view reads.

use std::path::{Path, PathBuf};

use thin_vec::ThinVec;

use crate::arena::{Arena, OptionSlotIndex, SlotIndex};

/// Whether a directory's children have been listed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListingState {
    /// Not listed yet; reports no children until the scanner gets to it.
    Pending,
    /// Listing completed.
    Loaded,
    /// Listing failed (permissions, vanished directory); reports no children.
    Failed,
}

/// One raw filesystem entry.
#[derive(Debug)]
pub(crate) struct DirNode {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) is_dir: bool,
    pub(crate) parent: OptionSlotIndex,
    pub(crate) children: ThinVec<SlotIndex>,
    pub(crate) listing: ListingState,
}

/// A listed entry handed over by the scanner.
#[derive(Debug)]
pub(crate) struct DirEntryInfo {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) is_dir: bool,
}

/// The raw directory tree, shared between the owning thread and the
/// scanner/watcher workers.
///
/// Slots are never freed within a generation: a re-listing that drops an
/// entry detaches its subtree (severs the parent link) instead, so a stale
/// handle can never be recycled onto a different node. The whole arena is
/// replaced when the view rebinds its root.
#[derive(Debug)]
pub(crate) struct DirTreeData {
    nodes: Arena<DirNode>,
    root: SlotIndex,
}

impl DirTreeData {
    /// Creates a tree holding only the (pending) root entry.
    pub(crate) fn new(root_path: PathBuf) -> Self {
        let is_dir = root_path.is_dir();
        let name = root_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root_path.to_string_lossy().into_owned());
        let mut nodes = Arena::new();
        let root = nodes.insert(DirNode {
            path: root_path,
            name,
            is_dir,
            parent: OptionSlotIndex::none(),
            children: ThinVec::new(),
            listing: ListingState::Pending,
        });
        Self { nodes, root }
    }

    #[inline]
    pub(crate) fn root(&self) -> SlotIndex {
        self.root
    }

    #[inline]
    pub(crate) fn node(&self, id: SlotIndex) -> Option<&DirNode> {
        self.nodes.get(id)
    }

    /// Returns true if `id` is still attached to the current root.
    ///
    /// Detached subtrees keep their slots but lose their parent link, so the
    /// walk up from a detached node ends somewhere other than the root.
    pub(crate) fn is_reachable(&self, id: SlotIndex) -> bool {
        let mut current = id;
        loop {
            let Some(node) = self.nodes.get(current) else {
                return false;
            };
            match node.parent.to_option() {
                Some(parent) => current = parent,
                None => return current == self.root,
            }
        }
    }

    /// Replaces the listing of `dir` with `entries`, reusing nodes whose
    /// name and kind are unchanged and detaching the rest.
    ///
    /// Returns the ids of newly created child directories (still pending)
    /// so the caller can descend into them.
    pub(crate) fn apply_listing(
        &mut self,
        dir: SlotIndex,
        entries: Vec<DirEntryInfo>,
    ) -> Vec<SlotIndex> {
        if self.nodes.get(dir).is_none() {
            return Vec::new();
        }
        let old: Vec<SlotIndex> = self.nodes[dir].children.iter().copied().collect();

        let mut new_children = ThinVec::new();
        let mut added_dirs = Vec::new();
        for entry in entries {
            let existing = old.iter().copied().find(|&id| {
                let node = &self.nodes[id];
                node.name == entry.name && node.is_dir == entry.is_dir
            });
            match existing {
                Some(id) => new_children.push(id),
                None => {
                    let listing = if entry.is_dir {
                        ListingState::Pending
                    } else {
                        ListingState::Loaded
                    };
                    let id = self.nodes.insert(DirNode {
                        path: entry.path,
                        name: entry.name,
                        is_dir: entry.is_dir,
                        parent: OptionSlotIndex::some(dir),
                        children: ThinVec::new(),
                        listing,
                    });
                    if entry.is_dir {
                        added_dirs.push(id);
                    }
                    new_children.push(id);
                }
            }
        }

        for id in old {
            if !new_children.contains(&id) {
                self.nodes[id].parent = OptionSlotIndex::none();
            }
        }

        let node = &mut self.nodes[dir];
        node.children = new_children;
        node.listing = ListingState::Loaded;
        added_dirs
    }

    /// Marks `dir` as unlistable, detaching any children it had.
    pub(crate) fn mark_failed(&mut self, dir: SlotIndex) {
        if self.nodes.get(dir).is_none() {
            return;
        }
        let old: Vec<SlotIndex> = self.nodes[dir].children.iter().copied().collect();
        for id in old {
            self.nodes[id].parent = OptionSlotIndex::none();
        }
        let node = &mut self.nodes[dir];
        node.children = ThinVec::new();
        node.listing = ListingState::Failed;
    }

    /// Locates the node for an absolute path by segment traversal from the
    /// root, or `None` when the path lies outside the tree or has not been
    /// listed yet.
    pub(crate) fn index_for_path(&self, path: &Path) -> Option<SlotIndex> {
        let root_path = &self.nodes[self.root].path;
        if path == root_path {
            return Some(self.root);
        }
        let relative = path.strip_prefix(root_path).ok()?;

        let mut current = self.root;
        for segment in relative {
            let next = self.nodes[current].children.iter().copied().find(|&id| {
                self.nodes
                    .get(id)
                    .is_some_and(|node| std::ffi::OsStr::new(&node.name) == segment)
            })?;
            current = next;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(base: &str, name: &str, is_dir: bool) -> DirEntryInfo {
        DirEntryInfo {
            name: name.to_string(),
            path: Path::new(base).join(name),
            is_dir,
        }
    }

    fn listed_tree() -> (DirTreeData, SlotIndex) {
        let mut data = DirTreeData::new(PathBuf::from("/root"));
        let root = data.root();
        data.apply_listing(
            root,
            vec![
                entry("/root", "S_0001", true),
                entry("/root", "notes.txt", false),
            ],
        );
        (data, root)
    }

    #[test]
    fn apply_listing_attaches_children() {
        let (data, root) = listed_tree();
        let node = data.node(root).unwrap();
        assert_eq!(node.listing, ListingState::Loaded);
        assert_eq!(node.children.len(), 2);

        let s_dir = data.index_for_path(Path::new("/root/S_0001")).unwrap();
        assert!(data.node(s_dir).unwrap().is_dir);
        assert!(data.is_reachable(s_dir));
    }

    #[test]
    fn relisting_reuses_surviving_nodes_and_detaches_the_rest() {
        let (mut data, root) = listed_tree();
        let s_dir = data.index_for_path(Path::new("/root/S_0001")).unwrap();
        let file = data.index_for_path(Path::new("/root/notes.txt")).unwrap();

        let added = data.apply_listing(
            root,
            vec![entry("/root", "S_0001", true), entry("/root", "S_0002", true)],
        );
        assert_eq!(added.len(), 1);

        // The surviving directory kept its slot; the file was detached.
        assert_eq!(data.index_for_path(Path::new("/root/S_0001")), Some(s_dir));
        assert!(!data.is_reachable(file));
        assert_eq!(data.index_for_path(Path::new("/root/notes.txt")), None);
    }

    #[test]
    fn mark_failed_clears_children() {
        let (mut data, root) = listed_tree();
        let s_dir = data.index_for_path(Path::new("/root/S_0001")).unwrap();

        data.mark_failed(root);
        assert_eq!(data.node(root).unwrap().listing, ListingState::Failed);
        assert!(data.node(root).unwrap().children.is_empty());
        assert!(!data.is_reachable(s_dir));
    }

    #[test]
    fn index_for_path_walks_segments() {
        let (mut data, _root) = listed_tree();
        let s_dir = data.index_for_path(Path::new("/root/S_0001")).unwrap();
        data.apply_listing(s_dir, vec![entry("/root/S_0001", "S_0002", true)]);

        let nested = data.index_for_path(Path::new("/root/S_0001/S_0002"));
        assert!(nested.is_some());
        assert_eq!(data.index_for_path(Path::new("/root/absent")), None);
        assert_eq!(data.index_for_path(Path::new("/elsewhere")), None);
    }
}
