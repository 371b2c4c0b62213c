//! Capability probe for the storage engine.
//!
//! Runs once at startup: write and remove a sentinel key. Any failure,
//! including a missing engine (restricted browsing contexts), turns
//! persistence off for the rest of the process.

use std::fmt;
use std::sync::Once;

use tracing::{debug, warn};

use crate::storage::SharedStore;

#[cfg(test)]
#[path = "probe_test.rs"]
mod probe_test;

/// Sentinel key written and removed by [`probe`].
pub const PROBE_KEY: &str = "localstate.probe";

static UNAVAILABLE_WARNING: Once = Once::new();

/// Where the process is running. Only browsers get the unavailable warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostContext {
    Browser,
    Headless,
}

impl HostContext {
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") { Self::Browser } else { Self::Headless }
    }
}

/// Result of the probe: the usable engine, or nothing.
#[derive(Clone)]
pub enum Capability {
    Available(SharedStore),
    Unavailable,
}

impl Capability {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    #[must_use]
    pub fn store(&self) -> Option<&SharedStore> {
        match self {
            Self::Available(store) => Some(store),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_available() { "Available" } else { "Unavailable" })
    }
}

/// Probe `store` by writing and removing [`PROBE_KEY`].
#[must_use]
pub fn probe(store: Option<SharedStore>, host: HostContext) -> Capability {
    probe_with_warning(store, host, &UNAVAILABLE_WARNING)
}

fn probe_with_warning(store: Option<SharedStore>, host: HostContext, warned: &Once) -> Capability {
    let capability = match store {
        Some(store) => match store
            .set_item(PROBE_KEY, "probe")
            .and_then(|()| store.remove_item(PROBE_KEY))
        {
            Ok(()) => Capability::Available(store),
            Err(e) => {
                debug!(error = %e, "storage probe failed");
                Capability::Unavailable
            }
        },
        None => Capability::Unavailable,
    };

    if !capability.is_available() && host == HostContext::Browser {
        warned.call_once(|| {
            warn!("localStorage not found; component state will not be stored");
        });
    }

    capability
}
