//! Change notifications emitted by the tree models.
//!
//! Subscribers receive events through crossbeam channels. Emission never
//! blocks and tolerates dropped receivers; the registry prunes them on the
//! next send. Worker threads (directory scanner, watcher) emit through the
//! same registry, so sends must be safe from any thread.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::position::Position;

/// A structural change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// The whole tree was replaced; every previously minted position is dead.
    Reset,
    /// Rows `first..=last` were inserted under `parent`.
    RowsInserted {
        parent: Position,
        first: usize,
        last: usize,
    },
    /// The listing of `path` completed in the underlying directory source.
    DirectoryLoaded(PathBuf),
}

/// Shared fan-out registry for model events.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventHub {
    senders: Arc<Mutex<Vec<Sender<ModelEvent>>>>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub(crate) fn subscribe(&self) -> Receiver<ModelEvent> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, dropping dead ones.
    pub(crate) fn emit(&self, event: ModelEvent) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_every_subscriber() {
        let hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.emit(ModelEvent::Reset);

        assert_eq!(a.try_recv(), Ok(ModelEvent::Reset));
        assert_eq!(b.try_recv(), Ok(ModelEvent::Reset));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = EventHub::new();
        let a = hub.subscribe();
        drop(hub.subscribe());

        hub.emit(ModelEvent::Reset);
        hub.emit(ModelEvent::DirectoryLoaded(PathBuf::from("/tmp")));

        assert_eq!(a.try_recv(), Ok(ModelEvent::Reset));
        assert_eq!(
            a.try_recv(),
            Ok(ModelEvent::DirectoryLoaded(PathBuf::from("/tmp")))
        );
        assert_eq!(hub.senders.lock().len(), 1);
    }
}
