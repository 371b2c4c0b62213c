//! Adapter configuration, computed once at startup.
//!
//! DESIGN
//! ======
//! The probe result, the execution environment and the optional unload
//! target travel together in one immutable value handed to every adapter.
//! Nothing is read from ambient globals after construction.

use std::fmt;
use std::rc::Rc;

use crate::error::ConfigError;
use crate::probe::Capability;
use crate::unload::UnloadTarget;

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

const ENV_VAR: &str = "LOCALSTATE_ENV";
const CONSISTENCY_CHECK_VAR: &str = "LOCALSTATE_CONSISTENCY_CHECK";

/// Execution environment. Decides whether a consistency-check mismatch is
/// reported or ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// Environment implied by the build profile.
    #[must_use]
    pub fn from_build() -> Self {
        if cfg!(debug_assertions) { Self::Development } else { Self::Production }
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Everything an adapter needs besides the component itself.
#[derive(Clone)]
pub struct AdapterConfig {
    pub capability: Capability,
    pub environment: Environment,
    /// Compare the stored value against the last known snapshot before
    /// each write.
    pub consistency_check: bool,
    pub unload: Option<Rc<dyn UnloadTarget>>,
}

impl AdapterConfig {
    #[must_use]
    pub fn new(capability: Capability) -> Self {
        Self { capability, environment: Environment::from_build(), consistency_check: false, unload: None }
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `LOCALSTATE_ENV`: `production` or `development` (default: build profile)
    /// - `LOCALSTATE_CONSISTENCY_CHECK`: `true`/`false`/`1`/`0` (default `false`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unrecognized values.
    pub fn from_env(capability: Capability) -> Result<Self, ConfigError> {
        let environment = parse_environment(std::env::var(ENV_VAR).ok().as_deref())?;
        let consistency_check = parse_flag(CONSISTENCY_CHECK_VAR, std::env::var(CONSISTENCY_CHECK_VAR).ok().as_deref())?;
        Ok(Self { capability, environment, consistency_check, unload: None })
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_consistency_check(mut self, enabled: bool) -> Self {
        self.consistency_check = enabled;
        self
    }

    #[must_use]
    pub fn with_unload_target(mut self, target: Rc<dyn UnloadTarget>) -> Self {
        self.unload = Some(target);
        self
    }

    /// Probe `window.localStorage` and bind the window's `beforeunload`.
    #[cfg(feature = "hydrate")]
    #[must_use]
    pub fn browser() -> Self {
        use crate::browser::{BrowserStore, WindowUnload};
        use crate::probe::{HostContext, probe};
        use crate::storage::SharedStore;

        let store = BrowserStore::local().ok().map(|store| Rc::new(store) as SharedStore);
        let capability = probe(store, HostContext::Browser);
        let mut config = Self::from_env(capability.clone()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring invalid localstate config");
            Self::new(capability)
        });
        if let Some(target) = WindowUnload::new() {
            config.unload = Some(Rc::new(target));
        }
        config
    }
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("capability", &self.capability)
            .field("environment", &self.environment)
            .field("consistency_check", &self.consistency_check)
            .field("unload", &self.unload.is_some())
            .finish()
    }
}

fn parse_environment(raw: Option<&str>) -> Result<Environment, ConfigError> {
    match raw {
        None => Ok(Environment::from_build()),
        Some("production") => Ok(Environment::Production),
        Some("development") => Ok(Environment::Development),
        Some(other) => Err(ConfigError::Invalid {
            var: ENV_VAR,
            value: other.to_owned(),
            expected: "'production' or 'development'",
        }),
    }
}

fn parse_flag(var: &'static str, raw: Option<&str>) -> Result<bool, ConfigError> {
    match raw {
        None => Ok(false),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(ConfigError::Invalid { var, value: other.to_owned(), expected: "a boolean" }),
    }
}
