//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components and task pipelines.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Snapshot and store disagree, or a collaborator returned a case that
    /// cannot occur. Ends the affected pipeline; never retried.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Store transaction could not be run.
    #[error("store error: {0}")]
    Store(String),
    /// Network failure that a body chose to surface.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    /// Configuration is malformed or inconsistent.
    #[error("config error: {0}")]
    Config(String),
}

/// Failures reported by the network collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Server answered with an RPC error.
    #[error("rpc error {code}: {description}")]
    Rpc {
        /// Numeric error code.
        code: i32,
        /// Error description.
        description: String,
    },
    /// Transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
