//! Host component model consumed by the adapter.
//!
//! DESIGN
//! ======
//! The host framework owns the component. The adapter only needs its props,
//! its state, the host's state-update primitive and the two lifecycle hooks
//! it wraps. Key and filter overrides are optional trait methods that
//! default to "not provided".

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::filter::FilterKeys;
use crate::key::{KeyProp, StorageKey};

#[cfg(test)]
#[path = "component_test.rs"]
mod component_test;

/// Component state: string keys to JSON values.
pub type State = Map<String, Value>;

/// Read-only configuration handed down by the parent.
#[derive(Clone, Default)]
pub struct Props {
    pub local_storage_key: Option<KeyProp>,
    pub state_filter_keys: Option<FilterKeys>,
    pub extra: Map<String, Value>,
}

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.local_storage_key = Some(KeyProp::Value(key.into()));
        self
    }

    /// `localStorageKey={false}`.
    #[must_use]
    pub fn without_storage(mut self) -> Self {
        self.local_storage_key = Some(KeyProp::Disabled);
        self
    }

    #[must_use]
    pub fn with_storage_key_fn<F>(mut self, compute: F) -> Self
    where
        F: Fn(&Props) -> StorageKey + 'static,
    {
        self.local_storage_key = Some(KeyProp::Computed(Rc::new(compute)));
        self
    }

    #[must_use]
    pub fn with_filter_keys(mut self, keys: impl Into<FilterKeys>) -> Self {
        self.state_filter_keys = Some(keys.into());
        self
    }

    /// Attach an arbitrary prop.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("local_storage_key", &self.local_storage_key)
            .field("state_filter_keys", &self.state_filter_keys)
            .field("extra", &self.extra)
            .finish()
    }
}

/// A UI component whose state can be persisted.
pub trait Component {
    fn props(&self) -> &Props;

    /// Current state, `None` when the component never set any.
    fn state(&self) -> Option<&State>;

    /// Host state-update primitive. Merges `partial` into the current state.
    fn set_state(&mut self, partial: State);

    /// Per-instance display name.
    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Type-level display name, shared by every instance.
    fn static_display_name(&self) -> Option<&'static str> {
        None
    }

    /// Bare type name, the last resort before the fallback key.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Override for key derivation. `Some(StorageKey::Disabled)` turns
    /// persistence off for this instance.
    fn local_storage_key(&self) -> Option<StorageKey> {
        None
    }

    /// Override for the filter keys.
    fn state_filter_keys(&self) -> Option<FilterKeys> {
        None
    }

    /// Runs after the stored state has been applied.
    fn did_mount(&mut self) {}

    /// Runs before the final save.
    fn will_unmount(&mut self) {}
}

/// `my_crate::ui::Panel<T>` -> `Panel`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Component without behavior of its own: a name, props and state.
#[derive(Clone, Debug, Default)]
pub struct PlainComponent {
    name: Option<String>,
    props: Props,
    state: Option<State>,
}

impl PlainComponent {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    /// Component without any display name.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Initial state, as returned by the component's constructor.
    #[must_use]
    pub fn with_initial_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }
}

impl Component for PlainComponent {
    fn props(&self) -> &Props {
        &self.props
    }

    fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    fn set_state(&mut self, partial: State) {
        self.state.get_or_insert_with(State::new).extend(partial);
    }

    fn display_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn type_name(&self) -> &'static str {
        ""
    }
}
