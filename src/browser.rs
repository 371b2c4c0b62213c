//! Browser bindings: `window.localStorage` and the `beforeunload` event.
//!
//! SYSTEM CONTEXT
//! ==============
//! Hydrate-only. Centralizes the web-sys glue so the rest of the crate only
//! sees [`KeyValueStore`] and [`UnloadTarget`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::error::StorageError;
use crate::storage::KeyValueStore;
use crate::unload::{ListenerId, UnloadHandler, UnloadTarget};

const UNLOAD_EVENT: &str = "beforeunload";

/// `window.localStorage`.
pub struct BrowserStore {
    storage: web_sys::Storage,
}

impl BrowserStore {
    /// Handle to the window's `localStorage`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] without a window, or when the
    /// browser refuses access (private mode, disabled cookies).
    pub fn local() -> Result<Self, StorageError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or(StorageError::Unavailable)?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for BrowserStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Read { key: key.to_owned(), reason: format!("{e:?}") })
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| StorageError::Write { key: key.to_owned(), reason: format!("{e:?}") })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage
            .remove_item(key)
            .map_err(|e| StorageError::Remove { key: key.to_owned(), reason: format!("{e:?}") })
    }
}

/// `beforeunload` on the window.
///
/// Closures are kept alive here until their listener is removed. A removed
/// closure may still be running (handlers deregister themselves), so it is
/// parked in `retired` and dropped on the next registration.
pub struct WindowUnload {
    window: web_sys::Window,
    next_id: Cell<u64>,
    closures: RefCell<HashMap<ListenerId, Closure<dyn FnMut()>>>,
    retired: RefCell<Vec<Closure<dyn FnMut()>>>,
}

impl WindowUnload {
    /// `None` outside a browser window.
    #[must_use]
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        Some(Self {
            window,
            next_id: Cell::new(0),
            closures: RefCell::new(HashMap::new()),
            retired: RefCell::new(Vec::new()),
        })
    }
}

impl UnloadTarget for WindowUnload {
    fn add_listener(&self, handler: UnloadHandler) -> ListenerId {
        self.retired.borrow_mut().clear();
        let id = ListenerId::from_raw(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);

        let closure = Closure::<dyn FnMut()>::new(move || handler());
        if let Err(e) = self
            .window
            .add_event_listener_with_callback(UNLOAD_EVENT, closure.as_ref().unchecked_ref())
        {
            tracing::warn!(error = ?e, "failed to register beforeunload listener");
            return id;
        }
        self.closures.borrow_mut().insert(id, closure);
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let Some(closure) = self.closures.borrow_mut().remove(&id) else {
            return;
        };
        let _ = self
            .window
            .remove_event_listener_with_callback(UNLOAD_EVENT, closure.as_ref().unchecked_ref());
        self.retired.borrow_mut().push(closure);
    }
}
