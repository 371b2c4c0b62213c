//! Lifecycle binder: load after mount, save before teardown.
//!
//! DESIGN
//! ======
//! [`LocalStorage`] wraps a component by composition. It exposes the same
//! lifecycle surface (`mount`, `set_state`, `unmount`) and runs the wrapped
//! component's own hooks at the right points:
//!
//! ```text
//! Unmounted -> Loading -> Loaded -> Unmounting -> Unmounted
//! ```
//!
//! Mount is a synchronous two-phase routine: resolve key, read and apply the
//! stored snapshot, set the loaded flag, register the unload safety net, then
//! run the inner `did_mount`. Saves are refused until the loaded flag is set
//! so defaults never clobber a snapshot that has not been read yet.
//!
//! State is written exactly once, at teardown. Intermediate updates never
//! touch storage.
//!
//! TRADE-OFFS
//! ==========
//! Storage and parse failures are logged and swallowed so the host lifecycle
//! always completes. The one exception is a consistency-check mismatch
//! outside production, which is returned to the caller after teardown has
//! otherwise finished.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use crate::component::{Component, State};
use crate::config::AdapterConfig;
use crate::consistency::verify_unchanged;
use crate::error::PersistError;
use crate::filter::project_state;
use crate::key::{DisplayName, KeySources, StorageKey, resolve_display_name, resolve_key};
use crate::unload::ListenerId;

#[cfg(test)]
#[path = "adapter_test.rs"]
mod adapter_test;

/// Lifecycle position of a wrapped component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unmounted,
    Loading,
    Loaded,
    Unmounting,
}

/// What happened during the load half of `mount`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A stored snapshot was applied to the component.
    Applied,
    /// Nothing stored under the key.
    Empty,
    /// The key resolved to `Disabled`.
    Disabled,
    /// Storage is unavailable for the process.
    Unavailable,
    /// The stored value could not be used; it was ignored.
    Malformed,
    /// The storage read failed; nothing was applied.
    Failed,
    /// `mount` was called on a component that is already mounted.
    AlreadyMounted,
}

/// Why a save did not write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Unavailable,
    NotLoaded,
    Disabled,
}

/// Result of a save attempt that did not raise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { key: String },
    Skipped(SkipReason),
    /// Storage or serialization failed; the failure was logged.
    Failed,
}

/// A component whose state is mirrored into storage.
pub struct LocalStorage<C> {
    binding: Rc<RefCell<Binding<C>>>,
}

impl<C> Clone for LocalStorage<C> {
    fn clone(&self) -> Self {
        Self { binding: self.binding.clone() }
    }
}

struct Binding<C> {
    component: C,
    config: AdapterConfig,
    phase: Phase,
    loaded: bool,
    unload_listener: Option<ListenerId>,
    /// Snapshot this instance last read from or wrote to storage.
    last_synced: Option<Value>,
}

impl<C: Component + 'static> LocalStorage<C> {
    /// Wrap `component`. Nothing is read until [`LocalStorage::mount`].
    #[must_use]
    pub fn wrap(component: C, config: AdapterConfig) -> Self {
        let binding = Binding {
            component,
            config,
            phase: Phase::Unmounted,
            loaded: false,
            unload_listener: None,
            last_synced: None,
        };
        Self { binding: Rc::new(RefCell::new(binding)) }
    }

    /// Load stored state, then run the wrapped component's `did_mount`.
    ///
    /// The wrapper stays borrowed while `did_mount` and the unload target's
    /// `add_listener` run; neither may call back into this `LocalStorage`.
    pub fn mount(&self) -> LoadOutcome {
        let weak = Rc::downgrade(&self.binding);
        let mut binding = self.binding.borrow_mut();
        if binding.phase != Phase::Unmounted {
            debug!(phase = ?binding.phase, "mount ignored; component already mounted");
            return LoadOutcome::AlreadyMounted;
        }

        binding.phase = Phase::Loading;
        let outcome = binding.load();
        binding.loaded = true;
        binding.phase = Phase::Loaded;

        if binding.config.capability.is_available() {
            binding.register_unload(weak);
        }

        binding.component.did_mount();
        outcome
    }

    /// Forward a state update to the component. Never writes storage.
    pub fn set_state(&self, partial: State) {
        self.binding.borrow_mut().component.set_state(partial);
    }

    /// Write the current snapshot now.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::ConcurrentExternalMutation`] when the
    /// consistency check is on and detects an out-of-band write. Every
    /// other failure is logged and reported as [`SaveOutcome::Failed`].
    pub fn save(&self) -> Result<SaveOutcome, PersistError> {
        self.binding.borrow_mut().save()
    }

    /// Run the wrapped `will_unmount`, save, and drop the unload safety net.
    /// Calling it again after teardown is a no-op.
    ///
    /// As with [`LocalStorage::mount`], `will_unmount` and the unload
    /// target's `remove_listener` run under the wrapper's borrow and must not
    /// call back into it.
    ///
    /// # Errors
    ///
    /// Same as [`LocalStorage::save`]. Teardown completes either way.
    pub fn unmount(&self) -> Result<(), PersistError> {
        self.binding.borrow_mut().unmount()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.binding.borrow().phase
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.binding.borrow().loaded
    }

    /// Key the next load or save would use.
    #[must_use]
    pub fn storage_key(&self) -> StorageKey {
        self.binding.borrow().storage_key()
    }

    /// Display name of the wrapped component.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let binding = self.binding.borrow();
        resolve_display_name(&display_name_of(&binding.component)).map(str::to_owned)
    }

    #[must_use]
    pub fn state(&self) -> Option<State> {
        self.binding.borrow().component.state().cloned()
    }

    pub fn with_component<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.binding.borrow().component)
    }

    pub fn with_component_mut<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.binding.borrow_mut().component)
    }
}

impl<C: Component + 'static> Binding<C> {
    fn label(&self) -> String {
        resolve_display_name(&display_name_of(&self.component)).unwrap_or("anonymous").to_owned()
    }

    fn storage_key(&self) -> StorageKey {
        let component = &self.component;
        let override_key = || component.local_storage_key();
        resolve_key(KeySources {
            override_key: Some(&override_key),
            prop: component.props().local_storage_key.as_ref(),
            props: component.props(),
            display_name: display_name_of(component),
        })
    }

    fn load(&mut self) -> LoadOutcome {
        // Whatever a previous mount saw no longer counts.
        self.last_synced = None;
        let Some(store) = self.config.capability.store().cloned() else {
            return LoadOutcome::Unavailable;
        };
        let StorageKey::Key(key) = self.storage_key() else {
            return LoadOutcome::Disabled;
        };

        let raw = match store.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadOutcome::Empty,
            Err(e) => {
                warn!(component = %self.label(), %key, error = %e, "unable to load state from storage");
                return LoadOutcome::Failed;
            }
        };

        let parsed = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => value,
            Err(e) => {
                let err = PersistError::MalformedStoredValue { key: key.clone(), reason: e.to_string() };
                warn!(component = %self.label(), error = %err, "unable to load state from storage");
                self.last_synced = Some(Value::String(raw));
                return LoadOutcome::Malformed;
            }
        };
        self.last_synced = Some(parsed.clone());

        match parsed {
            Value::Null => LoadOutcome::Empty,
            Value::Object(snapshot) => {
                self.component.set_state(snapshot);
                debug!(component = %self.label(), %key, "applied stored state");
                LoadOutcome::Applied
            }
            other => {
                let err = PersistError::MalformedStoredValue {
                    key,
                    reason: format!("expected a JSON object, found {}", json_kind(&other)),
                };
                warn!(component = %self.label(), error = %err, "unable to load state from storage");
                LoadOutcome::Malformed
            }
        }
    }

    fn register_unload(&mut self, binding: Weak<RefCell<Self>>) {
        let Some(target) = self.config.unload.clone() else {
            return;
        };
        let id = target.add_listener(Rc::new(move || {
            if let Some(binding) = binding.upgrade() {
                flush_on_unload(&binding);
            }
        }));
        self.unload_listener = Some(id);
    }

    fn save(&mut self) -> Result<SaveOutcome, PersistError> {
        match self.try_save() {
            Ok(outcome) => Ok(outcome),
            Err(e @ PersistError::ConcurrentExternalMutation { .. }) => Err(e),
            Err(e) => {
                warn!(component = %self.label(), error = %e, "unable to save state to storage");
                Ok(SaveOutcome::Failed)
            }
        }
    }

    fn try_save(&mut self) -> Result<SaveOutcome, PersistError> {
        let Some(store) = self.config.capability.store().cloned() else {
            return Ok(SaveOutcome::Skipped(SkipReason::Unavailable));
        };
        if !self.loaded {
            return Ok(SaveOutcome::Skipped(SkipReason::NotLoaded));
        }
        let StorageKey::Key(key) = self.storage_key() else {
            return Ok(SaveOutcome::Skipped(SkipReason::Disabled));
        };

        let filter = self
            .component
            .state_filter_keys()
            .or_else(|| self.component.props().state_filter_keys.clone());
        let snapshot = project_state(self.component.state(), filter.as_ref());

        if self.config.consistency_check {
            verify_unchanged(&*store, &key, self.last_synced.as_ref(), self.config.environment)?;
        }

        let raw = serde_json::to_string(&snapshot).map_err(PersistError::Serialize)?;
        store.set_item(&key, &raw)?;
        debug!(component = %self.label(), %key, bytes = raw.len(), "saved state");

        self.last_synced = Some(snapshot);
        Ok(SaveOutcome::Written { key })
    }

    fn unmount(&mut self) -> Result<(), PersistError> {
        if self.phase != Phase::Loaded {
            return Ok(());
        }

        self.phase = Phase::Unmounting;
        self.component.will_unmount();
        let result = self.save();
        self.release_unload();
        self.loaded = false;
        self.phase = Phase::Unmounted;
        result.map(|_| ())
    }
}

impl<C> Binding<C> {
    fn release_unload(&mut self) {
        if let (Some(id), Some(target)) = (self.unload_listener.take(), self.config.unload.as_ref()) {
            target.remove_listener(id);
        }
    }
}

impl<C> Drop for Binding<C> {
    fn drop(&mut self) {
        self.release_unload();
    }
}

fn flush_on_unload<C: Component + 'static>(binding: &RefCell<Binding<C>>) {
    let Ok(mut binding) = binding.try_borrow_mut() else {
        warn!("component busy during page unload; state not flushed");
        return;
    };
    if let Err(e) = binding.unmount() {
        warn!(component = %binding.label(), error = %e, "state flush on page unload failed");
    }
}

fn display_name_of<C: Component>(component: &C) -> DisplayName<'_> {
    DisplayName {
        instance: component.display_name(),
        type_level: component.static_display_name(),
        type_name: Some(component.type_name()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
