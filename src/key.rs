//! Storage key derivation.
//!
//! DESIGN
//! ======
//! The key is recomputed on every load and save from a small capability
//! record instead of probing the component for optional methods. First
//! match wins:
//!
//! 1. instance override (`Component::local_storage_key`), used verbatim
//! 2. `props.local_storage_key == Disabled`
//! 3. `props.local_storage_key` computed from props
//! 4. `props.local_storage_key` literal, when non-empty
//! 5. display name
//! 6. [`FALLBACK_KEY`]
//!
//! Only an explicit [`StorageKey::Disabled`] turns persistence off. An
//! absent key falls through to the name-based defaults.

use std::fmt;
use std::rc::Rc;

use crate::component::Props;

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;

/// Key used when nothing else yields a name.
pub const FALLBACK_KEY: &str = "localstate";

/// Resolved storage key for one instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Key(String),
    /// Persistence is off for this instance.
    Disabled,
}

impl StorageKey {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Disabled => None,
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for StorageKey {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Disabled => f.write_str("<disabled>"),
        }
    }
}

/// Key computed from the instance's props.
pub type KeyFn = Rc<dyn Fn(&Props) -> StorageKey>;

/// The `local_storage_key` prop.
#[derive(Clone)]
pub enum KeyProp {
    Disabled,
    Value(String),
    /// Computed from the instance's props only. The function does not see
    /// the component itself, so it cannot read its display name or state.
    Computed(KeyFn),
}

impl fmt::Debug for KeyProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Value(key) => f.debug_tuple("Value").field(key).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Name candidates for an instance, most specific first.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisplayName<'a> {
    pub instance: Option<&'a str>,
    pub type_level: Option<&'a str>,
    pub type_name: Option<&'a str>,
}

/// First non-empty display name candidate.
#[must_use]
pub fn resolve_display_name<'a>(name: &DisplayName<'a>) -> Option<&'a str> {
    [name.instance, name.type_level, name.type_name]
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_empty())
}

/// Everything the resolver may consult for one instance.
#[derive(Clone, Copy)]
pub struct KeySources<'a> {
    pub override_key: Option<&'a dyn Fn() -> Option<StorageKey>>,
    pub prop: Option<&'a KeyProp>,
    pub props: &'a Props,
    pub display_name: DisplayName<'a>,
}

/// Apply the precedence order to `sources`.
#[must_use]
pub fn resolve_key(sources: KeySources<'_>) -> StorageKey {
    if let Some(key) = sources.override_key.and_then(|method| method()) {
        return key;
    }

    match sources.prop {
        Some(KeyProp::Disabled) => return StorageKey::Disabled,
        Some(KeyProp::Computed(compute)) => return compute(sources.props),
        Some(KeyProp::Value(key)) if !key.is_empty() => return StorageKey::Key(key.clone()),
        Some(KeyProp::Value(_)) | None => {}
    }

    resolve_display_name(&sources.display_name)
        .map_or_else(|| StorageKey::from(FALLBACK_KEY), StorageKey::from)
}
