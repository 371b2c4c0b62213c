//! Error types for storage access, persistence and configuration.

use serde_json::Value;

/// Failure reported by a [`KeyValueStore`](crate::storage::KeyValueStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No storage engine is reachable from this context.
    #[error("storage engine unavailable")]
    Unavailable,
    /// Reading `key` failed.
    #[error("failed to read '{key}': {reason}")]
    Read { key: String, reason: String },
    /// Writing `key` failed (quota, private browsing, ...).
    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },
    /// Removing `key` failed.
    #[error("failed to remove '{key}': {reason}")]
    Remove { key: String, reason: String },
}

/// Failure while loading or saving a component snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The capability probe failed; persistence is off for the process.
    #[error("storage is unavailable")]
    StorageUnavailable,
    /// The key resolved to `Disabled` for this instance.
    #[error("persistence disabled for this instance")]
    KeyDisabled,
    /// The stored value under `key` is not a JSON object.
    #[error("stored value under '{key}' is malformed: {reason}")]
    MalformedStoredValue { key: String, reason: String },
    /// The stored value changed since this instance last read or wrote it.
    #[error("stored value under '{key}' was modified outside this component")]
    ConcurrentExternalMutation {
        key: String,
        expected: Option<Value>,
        found: Option<Value>,
    },
    /// The snapshot could not be serialized.
    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Invalid value in an environment-provided setting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: '{value}' (expected {expected})")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}
