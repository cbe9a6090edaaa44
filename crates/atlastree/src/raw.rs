//! Raw source documents the tree mirror wraps.
//!
//! A [`RawDocument`] is an owned arena of named nodes with optional inline
//! text, built programmatically by callers; this crate neither parses nor
//! serializes any document format. Each document carries a process-unique id
//! so a subtree's owner document is always identifiable when it is imported
//! into another document.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`RawDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a node within its owning [`RawDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawNodeId(u32);

impl RawNodeId {
    #[inline]
    fn new(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "raw node id overflow");
        Self(index as u32)
    }

    #[inline]
    fn get(self) -> usize {
        self.0 as usize
    }
}

/// One node of a raw document: a name, ordered children, optional inline text.
#[derive(Debug, Clone)]
struct RawNode {
    name: String,
    text: Option<String>,
    children: Vec<RawNodeId>,
}

/// An owned, caller-built document tree.
#[derive(Debug)]
pub struct RawDocument {
    id: DocumentId,
    nodes: Vec<RawNode>,
    root: RawNodeId,
}

impl RawDocument {
    /// Creates a document containing only a root node named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = RawNode {
            name: root_name.into(),
            text: None,
            children: Vec::new(),
        };
        Self {
            id: DocumentId::next(),
            nodes: vec![root],
            root: RawNodeId::new(0),
        }
    }

    /// This document's process-unique identity.
    #[inline]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The root node id.
    #[inline]
    pub fn root(&self) -> RawNodeId {
        self.root
    }

    /// Number of nodes in the document.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the document holds only its root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Returns true if `node` belongs to this document.
    #[inline]
    pub fn contains(&self, node: RawNodeId) -> bool {
        node.get() < self.nodes.len()
    }

    /// Appends a new child named `name` under `parent`, returning its id.
    ///
    /// # Panics
    /// Panics if `parent` does not belong to this document.
    pub fn append_child(&mut self, parent: RawNodeId, name: impl Into<String>) -> RawNodeId {
        let id = RawNodeId::new(self.nodes.len());
        self.nodes.push(RawNode {
            name: name.into(),
            text: None,
            children: Vec::new(),
        });
        self.nodes[parent.get()].children.push(id);
        id
    }

    /// Sets the inline text of `node`.
    ///
    /// # Panics
    /// Panics if `node` does not belong to this document.
    pub fn set_text(&mut self, node: RawNodeId, text: impl Into<String>) {
        self.nodes[node.get()].text = Some(text.into());
    }

    /// Appends a child carrying inline text, returning its id.
    pub fn append_text_child(
        &mut self,
        parent: RawNodeId,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> RawNodeId {
        let id = self.append_child(parent, name);
        self.set_text(id, text);
        id
    }

    /// The name of `node`, or `None` for a foreign id.
    pub fn name(&self, node: RawNodeId) -> Option<&str> {
        self.nodes.get(node.get()).map(|n| n.name.as_str())
    }

    /// The inline text of `node`, if any.
    pub fn text(&self, node: RawNodeId) -> Option<&str> {
        self.nodes.get(node.get()).and_then(|n| n.text.as_deref())
    }

    /// The ordered children of `node`; empty for a foreign id.
    pub fn children(&self, node: RawNodeId) -> &[RawNodeId] {
        self.nodes
            .get(node.get())
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Deep-copies the subtree rooted at `node` in `src` into this document,
    /// appending it under `parent`.
    ///
    /// Returns the id of the copied subtree root, or `None` when `node` does
    /// not belong to `src` or `parent` does not belong to this document. The
    /// copy never retains any reference into `src`.
    pub fn import_subtree(
        &mut self,
        src: &RawDocument,
        node: RawNodeId,
        parent: RawNodeId,
    ) -> Option<RawNodeId> {
        if !src.contains(node) || !self.contains(parent) {
            return None;
        }
        let copied = self.copy_from(src, node);
        self.nodes[parent.get()].children.push(copied);
        Some(copied)
    }

    fn copy_from(&mut self, src: &RawDocument, node: RawNodeId) -> RawNodeId {
        let source = &src.nodes[node.get()];
        let id = RawNodeId::new(self.nodes.len());
        self.nodes.push(RawNode {
            name: source.name.clone(),
            text: source.text.clone(),
            children: Vec::new(),
        });
        for &child in &source.children {
            let copied = self.copy_from(src, child);
            self.nodes[id.get()].children.push(copied);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_read_back() {
        let mut doc = RawDocument::new("Atlas");
        let child = doc.append_child(doc.root(), "RegionSet");
        let leaf = doc.append_text_child(child, "Name", "cortex");

        assert_eq!(doc.name(doc.root()), Some("Atlas"));
        assert_eq!(doc.children(doc.root()), &[child]);
        assert_eq!(doc.text(leaf), Some("cortex"));
        assert_eq!(doc.text(child), None);
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn document_ids_are_unique() {
        let a = RawDocument::new("A");
        let b = RawDocument::new("B");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn import_subtree_deep_copies() {
        let mut src = RawDocument::new("Fragment");
        let region = src.append_child(src.root(), "Region");
        src.append_text_child(region, "Name", "thalamus");

        let mut dst = RawDocument::new("Atlas");
        let holder = dst.append_child(dst.root(), "RegionSet");

        let copied = dst.import_subtree(&src, region, holder).unwrap();
        assert_eq!(dst.name(copied), Some("Region"));
        assert_eq!(dst.children(holder), &[copied]);

        let copied_name = dst.children(copied)[0];
        assert_eq!(dst.text(copied_name), Some("thalamus"));

        // Mutating the source afterwards must not affect the copy.
        src.set_text(region, "changed");
        assert_eq!(dst.text(copied), None);
    }

    #[test]
    fn import_rejects_foreign_ids() {
        let src = RawDocument::new("Fragment");
        let mut dst = RawDocument::new("Atlas");
        let bogus = RawNodeId::new(42);
        assert!(dst.import_subtree(&src, bogus, dst.root()).is_none());
    }
}
