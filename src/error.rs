//! Error types surfaced by breakers and the registry.

use std::time::Duration;

use thiserror::Error;

use crate::resilience::settings::SettingsError;

/// Failure of a call made through a breaker.
///
/// Every variant is recoverable through a configured fallback; this type is
/// only seen when no fallback exists (or the fallback itself failed).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not attempted.
    #[error("circuit {circuit} is open")]
    Open { circuit: String },

    /// The operation missed its deadline.
    #[error("circuit {circuit} timed out after {timeout:?}")]
    Timeout { circuit: String, timeout: Duration },

    /// The operation's own error, unchanged.
    #[error(transparent)]
    Operation(E),

    /// The fallback ran and failed.
    #[error("fallback failed: {0}")]
    Fallback(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BreakerError::Open { .. } => "open",
            BreakerError::Timeout { .. } => "timeout",
            BreakerError::Operation(_) => "operation",
            BreakerError::Fallback(_) => "fallback",
        }
    }

    /// The error produced by user code, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) | BreakerError::Fallback(e) => Some(e),
            _ => None,
        }
    }
}

/// Rejected registration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("circuit name is required")]
    MissingName,

    #[error("circuit {0} has no run operation")]
    MissingRun(String),

    #[error("invalid settings for circuit {circuit}: {source}")]
    InvalidSettings {
        circuit: String,
        #[source]
        source: SettingsError,
    },

    #[error("circuit {0} is registered with a different operation signature")]
    SignatureMismatch(String),
}
