//! Page-teardown signal used as a safety net for unsaved state.
//!
//! Closing a tab or reloading never reaches the component's own teardown
//! hook, so adapters also register on a global unload signal.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[cfg(test)]
#[path = "unload_test.rs"]
mod unload_test;

/// Callback invoked when the page is about to go away.
pub type UnloadHandler = Rc<dyn Fn()>;

/// Registration handle returned by [`UnloadTarget::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Global event target exposing the teardown signal.
pub trait UnloadTarget {
    fn add_listener(&self, handler: UnloadHandler) -> ListenerId;

    /// Deregister `id`. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}

/// In-process unload signal. The host fires it with [`UnloadSignal::dispatch`].
#[derive(Default)]
pub struct UnloadSignal {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, UnloadHandler)>>,
}

impl UnloadSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every registered handler.
    ///
    /// Handlers run against a snapshot of the listener list, so a handler
    /// may deregister itself (or others) while the dispatch is in flight.
    pub fn dispatch(&self) {
        let snapshot: Vec<UnloadHandler> =
            self.listeners.borrow().iter().map(|(_, handler)| handler.clone()).collect();
        for handler in snapshot {
            handler();
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn next_listener_id(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ListenerId(id)
    }
}

impl UnloadTarget for UnloadSignal {
    fn add_listener(&self, handler: UnloadHandler) -> ListenerId {
        let id = self.next_listener_id();
        self.listeners.borrow_mut().push((id, handler));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(existing, _)| *existing != id);
    }
}

impl ListenerId {
    /// Build an id from a raw counter value. Used by foreign targets.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}
