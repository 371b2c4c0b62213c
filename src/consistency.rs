//! Advisory check for out-of-band changes to a stored snapshot.
//!
//! Before overwriting, the adapter compares what is in storage with the
//! snapshot it last loaded or wrote. A difference means another actor,
//! usually a second instance sharing the key, wrote in between. No lock is
//! taken, so a write can still slip in between the check and the save.

use serde_json::Value;
use tracing::debug;

use crate::config::Environment;
use crate::error::PersistError;
use crate::storage::KeyValueStore;

#[cfg(test)]
#[path = "consistency_test.rs"]
mod consistency_test;

/// Verify that `key` still holds `expected`.
///
/// Skipped entirely in [`Environment::Production`]. A stored value that is
/// not valid JSON is compared as a JSON string.
///
/// # Errors
///
/// Returns [`PersistError::ConcurrentExternalMutation`] on mismatch and
/// [`PersistError::Storage`] when the read fails.
pub fn verify_unchanged(
    store: &dyn KeyValueStore,
    key: &str,
    expected: Option<&Value>,
    environment: Environment,
) -> Result<(), PersistError> {
    if environment.is_production() {
        return Ok(());
    }

    let found = store
        .get_item(key)?
        .map(|raw| serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw)));

    if found.as_ref() == expected {
        return Ok(());
    }

    debug!(%key, "stored snapshot diverged from last known value");
    Err(PersistError::ConcurrentExternalMutation { key: key.to_owned(), expected: expected.cloned(), found })
}
