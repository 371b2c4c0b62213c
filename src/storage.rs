//! Storage engine capability.
//!
//! SYSTEM CONTEXT
//! ==============
//! The engine is external: a synchronous string-to-string map that may throw
//! on any call. Every adapter in the process shares one engine handle, so it
//! is passed around as [`SharedStore`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::StorageError;

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

/// Synchronous key-value engine with `localStorage` semantics.
pub trait KeyValueStore {
    /// Read the raw value for `key`. `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine rejects the read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine rejects the write.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine rejects the removal.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-wide engine handle.
pub type SharedStore = Rc<dyn KeyValueStore>;

/// In-process engine used headless and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning the engine as a [`SharedStore`]
    /// alongside a typed handle for inspection.
    #[must_use]
    pub fn shared() -> (Rc<Self>, SharedStore) {
        let store = Rc::new(Self::new());
        let shared: SharedStore = store.clone();
        (store, shared)
    }

    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Stored keys in lexical order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    /// Raw value for `key`, bypassing the fallible trait surface.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}
