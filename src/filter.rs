//! Projection of a state snapshot onto the keys worth persisting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::component::State;

#[cfg(test)]
#[path = "filter_test.rs"]
mod filter_test;

/// State keys to persist. A single string is accepted and treated as a
/// one-element list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterKeys {
    One(String),
    Many(Vec<String>),
}

impl FilterKeys {
    /// Normalized key list.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        match self {
            Self::One(key) => std::slice::from_ref(key),
            Self::Many(keys) => keys,
        }
    }
}

impl From<&str> for FilterKeys {
    fn from(key: &str) -> Self {
        Self::One(key.to_owned())
    }
}

impl From<String> for FilterKeys {
    fn from(key: String) -> Self {
        Self::One(key)
    }
}

impl<S: Into<String>> From<Vec<S>> for FilterKeys {
    fn from(keys: Vec<S>) -> Self {
        Self::Many(keys.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for FilterKeys {
    fn from(keys: [S; N]) -> Self {
        Self::Many(keys.into_iter().map(Into::into).collect())
    }
}

/// Value to persist for `state` under `filter`.
///
/// Without a filter, or without state, the state is returned whole
/// (`null` when absent). Otherwise only keys present in both the filter and
/// the state are kept.
#[must_use]
pub fn project_state(state: Option<&State>, filter: Option<&FilterKeys>) -> Value {
    let Some(state) = state else {
        return Value::Null;
    };
    let Some(filter) = filter else {
        return Value::Object(state.clone());
    };

    let projected: Map<String, Value> = filter
        .keys()
        .iter()
        .filter_map(|key| state.get(key).map(|value| (key.clone(), value.clone())))
        .collect();
    Value::Object(projected)
}
