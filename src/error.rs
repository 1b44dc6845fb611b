//! Error Handling Module
//!
//! Two channels, strictly separated:
//! - [`ConfigError`] surfaces synchronously at construction or setup time
//!   (invalid strategy parameters, registry wiring mistakes).
//! - [`RetryError`] is the asynchronous result channel of the engine; it is
//!   the only way a started call reports failure.
//!
//! Contract violations by the operation factory (a missing or unscheduled
//! attempt) are programming bugs and panic instead of flowing through either
//! channel.

use thiserror::Error;

/// Errors raised while building strategies or configuring the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A strategy parameter is outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        field: &'static str,
        reason: String,
    },

    /// Two strategies with the same name were handed to one registry.
    #[error("duplicate strategy name: {0}")]
    DuplicateStrategy(String),

    /// A lookup or default referenced a strategy the catalog does not hold.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// A category default referenced a strategy missing from the catalog.
    #[error("category `{category}` maps to unknown strategy `{strategy}`")]
    UnresolvedCategory { category: String, strategy: String },

    /// No default strategy has been configured.
    #[error("no default strategy configured")]
    NoDefault,

    /// The process-wide registry slot already holds a different registry.
    #[error("process-wide registry is already set")]
    AlreadySet,

    /// The process-wide registry slot has not been populated yet.
    #[error("process-wide registry is not set")]
    NotSet,

    /// The registry slot lock was poisoned by a panicking writer.
    #[error("registry lock poisoned")]
    LockPoisoned,
}

/// Final outcome of a retry loop that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// The last classified failure: non-transient, retry budget exhausted,
    /// or a forced stop carrying a cause.
    #[error("operation failed permanently")]
    Permanent(E),

    /// Cancellation was observed before any attempt produced a failure.
    #[error("operation cancelled before completion")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// The underlying operation error, when the outcome carries one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Permanent(error) => Some(error),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
