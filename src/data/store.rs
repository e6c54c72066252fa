//! Authoritative snapshot storage.
//!
//! The [`StateStore`] owns the live [`PipelineSnapshot`] and publishes every
//! change on a tokio watch channel. Readers hold a [`watch::Receiver`] and only
//! ever see an immutable view; the store's own methods are the only write path.

use tokio::sync::watch;

use pipewatch_types::{PipelineSnapshot, PipelineStatus, StatusEvent};

/// Holds the snapshot for the current subscription.
///
/// # Example
///
/// ```
/// use pipewatch::data::StateStore;
/// use pipewatch::{PipelineStatus, StatusEvent};
///
/// let store = StateStore::new();
/// let view = store.subscribe();
///
/// store.apply_event(StatusEvent::new().status(PipelineStatus::Running));
/// assert_eq!(view.borrow().status, PipelineStatus::Running);
///
/// store.reset();
/// assert_eq!(view.borrow().status, PipelineStatus::Initialized);
/// ```
#[derive(Debug)]
pub struct StateStore {
    sender: watch::Sender<PipelineSnapshot>,
}

impl StateStore {
    /// Create a store holding an initialized, empty snapshot.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(PipelineSnapshot::new());
        Self { sender }
    }

    /// Get a read-only view that is notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.sender.subscribe()
    }

    /// Clone the current snapshot.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.sender.borrow().clone()
    }

    /// Merge the fields present in `event`.
    ///
    /// Returns true if the snapshot changed. Readers are only notified on change.
    pub fn apply_event(&self, event: StatusEvent) -> bool {
        self.sender.send_if_modified(|snapshot| snapshot.merge(event))
    }

    /// Surface a transport failure as the `error` status.
    pub fn mark_error(&self) -> bool {
        self.apply_event(StatusEvent::new().status(PipelineStatus::Error))
    }

    /// Restore the initial values.
    pub fn reset(&self) {
        self.sender.send_if_modified(|snapshot| {
            if snapshot.is_empty() {
                false
            } else {
                snapshot.clear();
                true
            }
        });
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
