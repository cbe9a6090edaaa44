//! Session-atlas domain queries.
//!
//! Read-only helpers over the generic [`DocumentModel`] navigation and
//! search primitives. The tag names below belong to an externally-owned
//! schema and must match it exactly: case-sensitive, no aliasing.

use crate::doc::{DocumentModel, SearchFlags};
use crate::position::Position;

/// Session container element.
pub const SESSION_TAG_NAME: &str = "BioSemSession";
/// Display-name element.
pub const NAME_TAG_NAME: &str = "Name";
/// Unique-id element.
pub const UID_TAG_NAME: &str = "UID";
/// Data-folder element under the document root.
pub const DATA_FOLDER_TAG_NAME: &str = "DataFolder";
/// Ordered-dataset element nested in a session.
pub const ORDERED_DATASET_TAG_NAME: &str = "OrderedDataSet";

/// Leaf text of the first direct child of `parent` named `tag`.
fn child_text(model: &DocumentModel, parent: Position, tag: &str) -> Option<String> {
    let hits = model.search(tag, parent, SearchFlags::EXACT, 1);
    hits.first()
        .and_then(|&pos| model.data(pos, 1))
        .map(str::to_owned)
}

/// Text of the data-folder element under the document root.
pub fn data_directory(model: &DocumentModel) -> Option<String> {
    let hits = model.search(
        DATA_FOLDER_TAG_NAME,
        Position::INVALID,
        SearchFlags::default(),
        1,
    );
    hits.first()
        .and_then(|&pos| model.data(pos, 1))
        .map(str::to_owned)
}

/// All sessions as `(name, uid)` pairs, in document order.
///
/// A session missing its name or uid leaf contributes an empty string for
/// the missing field.
pub fn sessions(model: &DocumentModel) -> Vec<(String, String)> {
    model
        .search(
            SESSION_TAG_NAME,
            Position::INVALID,
            SearchFlags::default(),
            usize::MAX,
        )
        .into_iter()
        .map(|session| {
            (
                child_text(model, session, NAME_TAG_NAME).unwrap_or_default(),
                child_text(model, session, UID_TAG_NAME).unwrap_or_default(),
            )
        })
        .collect()
}

/// Names of the ordered datasets under the first session whose uid matches
/// `uid` exactly; empty when no session matches.
///
/// With duplicate uids the first session in document order wins.
pub fn datasets_for_session(model: &DocumentModel, uid: &str) -> Vec<String> {
    let sessions = model.search(
        SESSION_TAG_NAME,
        Position::INVALID,
        SearchFlags::default(),
        usize::MAX,
    );
    for session in sessions {
        if child_text(model, session, UID_TAG_NAME).as_deref() != Some(uid) {
            continue;
        }
        return model
            .search(
                ORDERED_DATASET_TAG_NAME,
                session,
                SearchFlags::default(),
                usize::MAX,
            )
            .into_iter()
            .filter_map(|dataset| child_text(model, dataset, NAME_TAG_NAME))
            .collect();
    }
    Vec::new()
}
