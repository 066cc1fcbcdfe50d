//! Change notification fanout.
//!
//! Each store owns a [`Subscribers`] registry and calls
//! [`notify`](Subscribers::notify) after a mutation has completed and its
//! locks are released. Every current listener receives every event, in
//! registration order, on the notifying thread. Listeners that need the UI
//! thread must re-dispatch themselves.
//!
//! Events are hints, not diffs: bulk operations only report a reload, and
//! consumers re-read the store to rebuild what they display.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::models::Element;

/// Raised by the material catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogChange {
    /// `true` after a full load, `false` after a single add-or-update.
    pub is_reload: bool,
}

/// Raised by the element outliner.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementChange {
    Added(Element),
    Updated(Element),
    Removed(Element),
    /// The whole list changed (load, bulk add). Re-read everything.
    Reloaded,
}

impl ElementChange {
    /// The affected record, if the change concerns exactly one.
    pub fn element(&self) -> Option<&Element> {
        match self {
            ElementChange::Added(e) | ElementChange::Updated(e) | ElementChange::Removed(e) => {
                Some(e)
            }
            ElementChange::Reloaded => None,
        }
    }

    pub fn is_reload(&self) -> bool {
        matches!(self, ElementChange::Reloaded)
    }
}

/// Handle returned by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A registry of listeners for one event type.
pub struct Subscribers<E> {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Listener<E>)>>,
}

impl<E> Subscribers<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe or
    /// unsubscribe from inside a callback. A panicking listener is logged and
    /// skipped.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<(SubscriptionId, Listener<E>)> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for (id, listener) in snapshot {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if result.is_err() {
                tracing::warn!(subscription = id.0, "change listener panicked; continuing delivery");
            }
        }
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ElementType;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_every_listener_receives_event() {
        let subs: Subscribers<CatalogChange> = Subscribers::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let a2 = a.clone();
        let b2 = b.clone();
        subs.subscribe(move |_| {
            a2.fetch_add(1, Ordering::SeqCst);
        });
        subs.subscribe(move |_| {
            b2.fetch_add(1, Ordering::SeqCst);
        });

        subs.notify(&CatalogChange { is_reload: true });
        subs.notify(&CatalogChange { is_reload: false });

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let subs: Subscribers<CatalogChange> = Subscribers::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = subs.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        subs.notify(&CatalogChange { is_reload: true });
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(subs.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let subs: Subscribers<ElementChange> = Subscribers::new();
        let count = Arc::new(AtomicUsize::new(0));
        subs.subscribe(|_| panic!("listener failure"));
        let c = count.clone();
        subs.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        subs.notify(&ElementChange::Reloaded);
        subs.notify(&ElementChange::Reloaded);

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn test_element_change_payload() {
        let e = Element::new("Shelf", ElementType::Part);
        let added = ElementChange::Added(e.clone());
        assert_eq!(added.element(), Some(&e));
        assert!(!added.is_reload());
        assert!(ElementChange::Reloaded.element().is_none());
        assert!(ElementChange::Reloaded.is_reload());
    }
}
