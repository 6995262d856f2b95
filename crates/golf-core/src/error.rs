//! Error types for golf-core.

use thiserror::Error;

/// Result type alias for golf-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while verifying and scoring a submission.
///
/// Build failures and timeouts are not errors; they are
/// [`Measurement`](crate::Measurement) variants.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Could not pack the source into an archive
    #[error("failed to stage source: {0}")]
    Staging(#[source] std::io::Error),

    /// The isolated environment could not be created or started
    #[error("sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    /// The runtime failed while the sandbox was running
    #[error("sandbox runtime error: {0}")]
    Runtime(#[from] golf_sandbox::RuntimeError),

    /// The sandbox specification violates the isolation policy
    #[error("invalid sandbox spec: {0}")]
    InvalidSpec(#[source] golf_sandbox::RuntimeError),

    /// Sandbox operation attempted in the wrong lifecycle state
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Highscore database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Binary sizes must be positive to be ranked
    #[error("invalid binary size: {0}")]
    InvalidSize(u64),

    /// A blocking ledger task panicked or was cancelled
    #[error("ledger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
