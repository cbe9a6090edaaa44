//! Navigable, positionally-addressed views over hierarchical session data.
//!
//! This crate provides two tree views behind one navigation contract:
//! - An indexed mirror of a caller-built session-atlas document, with
//!   stable anchored lookups and append-only insertion
//! - A live-filtered overlay over an asynchronously-scanned session data
//!   directory
//! - Domain queries (session listing, dataset listing) built on the
//!   generic traversal primitives

pub mod atlas;
pub mod dirtree;
pub mod doc;
pub mod error;
pub mod events;
pub mod model;
pub mod position;
pub mod raw;

mod arena;

// Re-export main types
pub use dirtree::{FilterState, FilteredDirTree, RESERVED_DIR_PREFIX};
pub use doc::{AnchorRegistry, DocumentModel, SearchFlags};
pub use error::{AtlasTreeError, Result};
pub use events::ModelEvent;
pub use model::TreeModel;
pub use position::Position;
pub use raw::{DocumentId, RawDocument, RawNodeId};
