//! The mirror node wrapping one raw document node.

use thin_vec::ThinVec;

use crate::arena::{OptionSlotIndex, SlotIndex};
use crate::raw::RawNodeId;

/// One slot of the document mirror.
///
/// Tracks the raw node it shadows, its parent slot, its ordered children and
/// its row within the parent. The mirror maintains `children[i].row == i` at
/// all times; the root has no parent and row 0. A text-bearing raw node is
/// mirrored as a leaf with its text captured here, and is never descended
/// into.
#[derive(Debug)]
pub(crate) struct TreeNode {
    /// Handle to the shadowed raw node.
    pub(crate) raw: RawNodeId,
    /// Parent slot, or none for the root.
    pub(crate) parent: OptionSlotIndex,
    /// Ordered child slots.
    pub(crate) children: ThinVec<SlotIndex>,
    /// Row within the parent's children.
    pub(crate) row: u32,
    /// Captured inline text for leaves.
    pub(crate) text: Option<String>,
}

impl TreeNode {
    pub(crate) fn new(
        raw: RawNodeId,
        parent: OptionSlotIndex,
        row: u32,
        text: Option<String>,
    ) -> Self {
        Self {
            raw,
            parent,
            children: ThinVec::new(),
            row,
            text,
        }
    }

    /// The `row`-th child slot, bounds-checked.
    #[inline]
    pub(crate) fn child(&self, row: usize) -> Option<SlotIndex> {
        self.children.get(row).copied()
    }

    #[inline]
    pub(crate) fn row(&self) -> usize {
        self.row as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_is_bounds_checked() {
        let mut node = TreeNode::new(
            crate::raw::RawDocument::new("x").root(),
            OptionSlotIndex::none(),
            0,
            None,
        );
        assert_eq!(node.child(0), None);

        let idx = SlotIndex::new(7);
        node.children.push(idx);
        assert_eq!(node.child(0), Some(idx));
        assert_eq!(node.child(1), None);
    }
}
