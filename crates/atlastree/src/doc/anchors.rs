//! Named position cache with staleness self-healing.

use fnv::FnvHashMap;
use log::debug;

use crate::position::Position;

/// Caches `name → Position` bindings so repeated lookups of well-known
/// subtrees skip the full document scan.
///
/// Anchors are advisory: the registry never owns the nodes it points at, and
/// an entry whose target is gone is silently dropped on the next lookup. The
/// liveness decision belongs to the owning model, which passes it in as a
/// closure.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    anchors: FnvHashMap<String, Position>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a binding, overwriting any existing one.
    ///
    /// An invalid position removes the binding instead.
    pub fn set(&mut self, name: &str, pos: Position) {
        if !pos.is_valid() {
            self.anchors.remove(name);
            return;
        }
        self.anchors.insert(name.to_string(), pos);
    }

    /// Returns the cached position for `name` after re-validating it with
    /// `is_live`; a stale entry is removed and reported as invalid.
    pub fn get(&mut self, name: &str, is_live: impl FnOnce(Position) -> bool) -> Position {
        let Some(&pos) = self.anchors.get(name) else {
            return Position::INVALID;
        };
        if is_live(pos) {
            pos
        } else {
            debug!("dropping stale anchor {name:?}");
            self.anchors.remove(name);
            Position::INVALID
        }
    }

    /// Removes a binding. Idempotent.
    pub fn remove(&mut self, name: &str) {
        self.anchors.remove(name);
    }

    /// Returns true if a binding exists for `name`, live or not.
    pub fn contains(&self, name: &str) -> bool {
        self.anchors.contains_key(name)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Returns true if no bindings are held.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::SlotIndex;

    fn pos(index: usize) -> Position {
        Position::new(SlotIndex::new(index), 0, 1)
    }

    #[test]
    fn round_trip_while_live() {
        let mut reg = AnchorRegistry::new();
        reg.set("RegionSet", pos(3));
        assert_eq!(reg.get("RegionSet", |_| true), pos(3));
        assert!(reg.contains("RegionSet"));
    }

    #[test]
    fn stale_entry_is_dropped_on_lookup() {
        let mut reg = AnchorRegistry::new();
        reg.set("RegionSet", pos(3));
        assert_eq!(reg.get("RegionSet", |_| false), Position::INVALID);
        assert!(!reg.contains("RegionSet"));
        // Second lookup misses cleanly.
        assert_eq!(reg.get("RegionSet", |_| true), Position::INVALID);
    }

    #[test]
    fn set_invalid_removes() {
        let mut reg = AnchorRegistry::new();
        reg.set("RegionSet", pos(3));
        reg.set("RegionSet", Position::INVALID);
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = AnchorRegistry::new();
        reg.set("RegionSet", pos(1));
        reg.remove("RegionSet");
        reg.remove("RegionSet");
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn set_overwrites() {
        let mut reg = AnchorRegistry::new();
        reg.set("RegionSet", pos(1));
        reg.set("RegionSet", pos(2));
        assert_eq!(reg.get("RegionSet", |_| true), pos(2));
        assert_eq!(reg.len(), 1);
    }
}
