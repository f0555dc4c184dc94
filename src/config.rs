use std::env;
use std::time::Duration;

use crate::error::{ContractError, Result};

/// Environment variable overriding the default debounce window, in milliseconds.
pub const DEBOUNCE_ENV: &str = "STATECAN_DEBOUNCE_MS";

/// Debounce window used when nothing else is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Per-store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// How long `execute*` waits before checking whether it was superseded.
    pub debounce: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// A missing variable falls back to the default; a malformed one is a
    /// [`ContractError::Config`].
    pub fn from_env() -> Result<Self> {
        match env::var(DEBOUNCE_ENV) {
            Ok(raw) => Self::default().with_debounce_ms(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    fn with_debounce_ms(self, raw: &str) -> Result<Self> {
        let millis: u64 = raw.trim().parse().map_err(|e| ContractError::Config {
            key: DEBOUNCE_ENV,
            reason: format!("{raw:?} is not a number of milliseconds ({e})"),
        })?;
        Ok(self.with_debounce(Duration::from_millis(millis)))
    }
}
