//! Navigation, search and insertion over the document mirror.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use crossbeam_channel::Receiver;
use log::debug;

use super::anchors::AnchorRegistry;
use super::node::TreeNode;
use crate::arena::{Arena, OptionSlotIndex, SlotIndex};
use crate::events::{EventHub, ModelEvent};
use crate::model::{TreeModel, HEADERS};
use crate::position::{next_epoch, Position};
use crate::raw::{RawDocument, RawNodeId};

bitflags! {
    /// Matching behavior for [`DocumentModel::search`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SearchFlags: u8 {
        /// Names must match exactly; without it matching is ASCII
        /// case-insensitive.
        const EXACT = 1 << 0;
        /// Scan the whole subtree; without it only direct children of the
        /// start position are candidates.
        const RECURSIVE = 1 << 1;
    }
}

impl Default for SearchFlags {
    fn default() -> Self {
        Self::EXACT | Self::RECURSIVE
    }
}

/// State held once a document has been loaded.
#[derive(Debug)]
struct Loaded {
    /// The owned raw document the mirror shadows.
    doc: RawDocument,
    /// Project base folder recorded alongside the document.
    base_folder: PathBuf,
    /// The shadow mirror.
    nodes: Arena<TreeNode>,
    /// Mirror slot of the document root.
    root: SlotIndex,
}

/// An indexed, navigable mirror of a raw document tree.
///
/// The mirror is rebuilt wholesale by [`load`](Self::load); positions and
/// anchors minted before a load die with it (they carry the old epoch).
/// Mutation is single-writer by construction: `load`, `insert` and anchor
/// writes all take `&mut self`.
///
/// Since the mirror arena is replaced on `load` and otherwise only appended
/// to, every live slot of the current epoch is reachable from the root;
/// slot liveness plus an epoch match is therefore the whole validity check.
#[derive(Debug, Default)]
pub struct DocumentModel {
    state: Option<Loaded>,
    anchors: AnchorRegistry,
    events: EventHub,
    epoch: u32,
}

impl DocumentModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a document has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Registers a change-notification subscriber.
    pub fn subscribe(&self) -> Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Replaces the mirror with a full rebuild from `doc`.
    ///
    /// Every previously minted position (anchored or not) is invalidated:
    /// the model epoch advances, so stale handles can never alias slots of
    /// the new mirror. Emits [`ModelEvent::Reset`].
    pub fn load(&mut self, doc: RawDocument, base_folder: impl Into<PathBuf>) {
        let mut nodes = Arena::new();
        let root = mirror_subtree(&mut nodes, &doc, doc.root(), OptionSlotIndex::none(), 0);
        self.epoch = next_epoch(self.epoch);
        debug!(
            "loaded document mirror: {} nodes, epoch {}",
            nodes.len(),
            self.epoch
        );
        self.state = Some(Loaded {
            doc,
            base_folder: base_folder.into(),
            nodes,
            root,
        });
        self.events.emit(ModelEvent::Reset);
    }

    /// Number of data columns: name and value.
    pub fn column_count(&self) -> usize {
        HEADERS.len()
    }

    /// Fixed column header for `section`.
    pub fn header(&self, section: usize) -> Option<&'static str> {
        HEADERS.get(section).copied()
    }

    /// Number of children under `parent`; the invalid position denotes the
    /// document root. Stale positions report 0.
    pub fn row_count(&self, parent: Position) -> usize {
        self.container(parent)
            .and_then(|id| self.node(id))
            .map_or(0, |node| node.children.len())
    }

    /// The `row`-th child of `parent`, or invalid when out of range.
    pub fn child(&self, parent: Position, row: usize) -> Position {
        self.container(parent)
            .and_then(|id| self.node(id))
            .and_then(|node| node.child(row))
            .map_or(Position::INVALID, |id| self.position(id))
    }

    /// The row of `pos` within its parent's children, or `None` for a dead
    /// position.
    pub fn row_of(&self, pos: Position) -> Option<usize> {
        self.node_at(pos).map(|node| node.row())
    }

    /// The parent of `pos`; invalid for the root, for children of the root,
    /// and for dead positions.
    pub fn parent(&self, pos: Position) -> Position {
        let Some(node) = self.node_at(pos) else {
            return Position::INVALID;
        };
        let Some(parent_id) = node.parent.to_option() else {
            return Position::INVALID;
        };
        match &self.state {
            Some(state) if parent_id != state.root => self.position(parent_id),
            _ => Position::INVALID,
        }
    }

    /// The display value at `(pos, column)`: column 0 is the node name,
    /// column 1 the captured leaf text.
    pub fn data(&self, pos: Position, column: usize) -> Option<&str> {
        let node = self.node_at(pos)?;
        match column {
            0 => self.state.as_ref()?.doc.name(node.raw),
            1 => node.text.as_deref(),
            _ => None,
        }
    }

    /// Depth-first pre-order scan of the subtree under `from` (or the whole
    /// document when `from` is invalid), collecting at most `limit` nodes
    /// whose name matches.
    ///
    /// The start node itself is not a candidate. Repeated calls on an
    /// unmutated tree return identical results in the same order.
    pub fn search(
        &self,
        name: &str,
        from: Position,
        flags: SearchFlags,
        limit: usize,
    ) -> Vec<Position> {
        let mut hits = Vec::new();
        if limit == 0 {
            return hits;
        }
        let Some(start) = self.container(from) else {
            return hits;
        };
        let Some(state) = self.state.as_ref() else {
            return hits;
        };

        let mut stack: Vec<SlotIndex> = state.nodes[start].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &state.nodes[id];
            let node_name = state.doc.name(node.raw).unwrap_or("");
            let matched = if flags.contains(SearchFlags::EXACT) {
                node_name == name
            } else {
                node_name.eq_ignore_ascii_case(name)
            };
            if matched {
                hits.push(self.position(id));
                if hits.len() == limit {
                    break;
                }
            }
            if flags.contains(SearchFlags::RECURSIVE) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        hits
    }

    /// Anchor-first lookup of the first node named `name`.
    ///
    /// A live anchor short-circuits the scan; otherwise the whole document
    /// is searched and, with `store_anchor`, the first hit is cached for the
    /// next call.
    pub fn find_by_name(&mut self, name: &str, store_anchor: bool) -> Position {
        let cached = self.anchor(name);
        if cached.is_valid() {
            return cached;
        }
        let hit = self
            .search(name, Position::INVALID, SearchFlags::default(), 1)
            .into_iter()
            .next()
            .unwrap_or(Position::INVALID);
        if store_anchor && hit.is_valid() {
            self.anchors.set(name, hit);
        }
        hit
    }

    /// Appends a deep copy of `subtree` (a node of `src`) as the last child
    /// of `parent`, emitting [`ModelEvent::RowsInserted`].
    ///
    /// The copy is imported into the owned document first; no reference into
    /// `src` is retained. Returns false only when `parent` is dead or the
    /// subtree id does not belong to `src`. Existing siblings keep their
    /// rows; the new node's row equals the parent's prior child count.
    pub fn insert(&mut self, parent: Position, src: &RawDocument, subtree: RawNodeId) -> bool {
        let epoch = self.epoch;
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let parent_id = if parent.is_valid() {
            if parent.epoch() != epoch || state.nodes.get(parent.index()).is_none() {
                return false;
            }
            parent.index()
        } else {
            state.root
        };

        let raw_parent = state.nodes[parent_id].raw;
        let Some(new_raw) = state.doc.import_subtree(src, subtree, raw_parent) else {
            return false;
        };

        let row = state.nodes[parent_id].children.len();
        let new_id = mirror_subtree(
            &mut state.nodes,
            &state.doc,
            new_raw,
            OptionSlotIndex::some(parent_id),
            row as u32,
        );
        state.nodes[parent_id].children.push(new_id);

        debug!("inserted subtree from document {:?} at row {row}", src.id());
        self.events.emit(ModelEvent::RowsInserted {
            parent,
            first: row,
            last: row,
        });
        true
    }

    /// Stores an anchor binding; an invalid position removes it.
    pub fn set_anchor(&mut self, name: &str, pos: Position) {
        self.anchors.set(name, pos);
    }

    /// Resolves an anchor, dropping it when stale.
    pub fn anchor(&mut self, name: &str) -> Position {
        let epoch = self.epoch;
        let Self { anchors, state, .. } = self;
        anchors.get(name, |pos| {
            pos.epoch() == epoch
                && state
                    .as_ref()
                    .is_some_and(|s| s.nodes.get(pos.index()).is_some())
        })
    }

    /// Removes an anchor binding. Idempotent.
    pub fn remove_anchor(&mut self, name: &str) {
        self.anchors.remove(name);
    }

    /// The owned raw document, once loaded.
    pub fn document(&self) -> Option<&RawDocument> {
        self.state.as_ref().map(|s| &s.doc)
    }

    /// The project base folder recorded at load time.
    pub fn base_folder(&self) -> Option<&Path> {
        self.state.as_ref().map(|s| s.base_folder.as_path())
    }

    fn position(&self, id: SlotIndex) -> Position {
        Position::new(id, 0, self.epoch)
    }

    /// Resolves a parent argument: invalid means the root, anything else is
    /// epoch- and liveness-checked.
    fn container(&self, pos: Position) -> Option<SlotIndex> {
        let state = self.state.as_ref()?;
        if !pos.is_valid() {
            return Some(state.root);
        }
        if pos.epoch() != self.epoch {
            return None;
        }
        state.nodes.get(pos.index()).map(|_| pos.index())
    }

    fn node(&self, id: SlotIndex) -> Option<&TreeNode> {
        self.state.as_ref()?.nodes.get(id)
    }

    fn node_at(&self, pos: Position) -> Option<&TreeNode> {
        if !pos.is_valid() || pos.epoch() != self.epoch {
            return None;
        }
        self.node(pos.index())
    }
}

impl TreeModel for DocumentModel {
    fn column_count(&self) -> usize {
        DocumentModel::column_count(self)
    }

    fn row_count(&self, parent: Position) -> usize {
        DocumentModel::row_count(self, parent)
    }

    fn child(&self, parent: Position, row: usize) -> Position {
        DocumentModel::child(self, parent, row)
    }

    fn parent(&self, pos: Position) -> Position {
        DocumentModel::parent(self, pos)
    }

    fn data(&self, pos: Position, column: usize) -> Option<String> {
        DocumentModel::data(self, pos, column).map(str::to_owned)
    }

    fn header(&self, section: usize) -> Option<&'static str> {
        DocumentModel::header(self, section)
    }
}

/// Recursively mirrors the raw subtree at `raw` into `nodes`.
///
/// A raw node carrying inline text becomes a leaf with the text captured;
/// its raw children, if any, are never descended into.
fn mirror_subtree(
    nodes: &mut Arena<TreeNode>,
    doc: &RawDocument,
    raw: RawNodeId,
    parent: OptionSlotIndex,
    row: u32,
) -> SlotIndex {
    let text = doc.text(raw).map(str::to_owned);
    let descend = text.is_none();
    let id = nodes.insert(TreeNode::new(raw, parent, row, text));
    if descend {
        for (index, &child_raw) in doc.children(raw).iter().enumerate() {
            let child_id = mirror_subtree(
                nodes,
                doc,
                child_raw,
                OptionSlotIndex::some(id),
                index as u32,
            );
            nodes[id].children.push(child_id);
        }
    }
    id
}
