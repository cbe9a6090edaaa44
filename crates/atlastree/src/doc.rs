//! Indexed document tree.
//!
//! A [`DocumentModel`] owns a raw document and a full shadow mirror of
//! lightweight nodes over it:
//!
//! - `node` - the mirror node with parent/child/row bookkeeping
//! - `anchors` - named position cache with staleness self-healing
//! - `model` - navigation, search, insertion, change notification

mod anchors;
mod model;
mod node;

pub use anchors::AnchorRegistry;
pub use model::{DocumentModel, SearchFlags};
