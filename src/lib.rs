//! # localstate
//!
//! Mirrors a component's state into the browser's `localStorage` and restores
//! it on the next mount, so the component resumes where it left off.
//!
//! SYSTEM CONTEXT
//! ==============
//! The host UI framework owns rendering and the component tree. This crate
//! only attaches to two lifecycle points (after mount, before teardown) and
//! to an optional page-unload signal. The storage engine is an external
//! capability that is probed once and then shared by every adapter.
//!
//! DESIGN
//! ======
//! - [`probe`](mod@probe) decides once whether storage is usable.
//! - [`key`] derives the storage key for an instance.
//! - [`filter`] projects the state down to the persisted subset.
//! - [`adapter`] sequences load, save and unload around the component's
//!   own lifecycle hooks.
//!
//! Persistence is best-effort. Storage and parse failures are logged and
//! swallowed; the only error that reaches the caller is a consistency-check
//! mismatch outside production.

pub mod adapter;
#[cfg(feature = "hydrate")]
pub mod browser;
pub mod component;
pub mod config;
pub mod consistency;
pub mod error;
pub mod filter;
pub mod key;
pub mod probe;
pub mod storage;
pub mod unload;

pub use adapter::{LoadOutcome, LocalStorage, Phase, SaveOutcome, SkipReason};
pub use component::{Component, PlainComponent, Props, State};
pub use config::{AdapterConfig, Environment};
pub use error::{ConfigError, PersistError, StorageError};
pub use filter::{FilterKeys, project_state};
pub use key::{FALLBACK_KEY, KeyProp, StorageKey, resolve_key};
pub use probe::{Capability, HostContext, probe};
pub use storage::{KeyValueStore, MemoryStore, SharedStore};
pub use unload::{ListenerId, UnloadSignal, UnloadTarget};
