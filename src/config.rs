//! Engine configuration.

use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Default bound on a mutating transaction, lock wait included.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Default bound on a balance read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
/// Default number of ids tried before creation gives up on collisions.
pub const DEFAULT_CREATE_ATTEMPTS: u32 = 3;

#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    #[diagnostic(code(ledger::config))]
    Zero(&'static str),
}

/// Timeouts and retry limits for [`crate::application::engine::LedgerEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound for `create` and `apply`, lock wait included.
    pub transaction_timeout: Duration,
    /// Upper bound for `balance`.
    pub read_timeout: Duration,
    /// How many fresh ids `create` tries when the store reports a collision.
    pub create_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            create_attempts: DEFAULT_CREATE_ATTEMPTS,
        }
    }
}

impl LedgerConfig {
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_create_attempts(mut self, attempts: u32) -> Self {
        self.create_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction_timeout.is_zero() {
            return Err(ConfigError::Zero("transaction timeout"));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::Zero("read timeout"));
        }
        if self.create_attempts == 0 {
            return Err(ConfigError::Zero("create attempts"));
        }
        Ok(())
    }
}
