//! Error types for golf-sandbox.

use thiserror::Error;

/// Result type alias for golf-sandbox operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while driving the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Could not reach the container runtime
    #[error("failed to connect to container runtime: {0}")]
    Connect(String),

    /// Failed to create the container
    #[error("failed to create container: {0}")]
    Create(String),

    /// Failed to copy the input archive into the container
    #[error("failed to upload archive: {0}")]
    Upload(String),

    /// Failed to start the container
    #[error("failed to start container: {0}")]
    Start(String),

    /// Failed while waiting for the container to exit
    #[error("failed to wait for container: {0}")]
    Wait(String),

    /// Failed to kill the container
    #[error("failed to kill container: {0}")]
    Kill(String),

    /// Failed to remove the container
    #[error("failed to remove container: {0}")]
    Remove(String),

    /// Failed to collect container output
    #[error("failed to read container logs: {0}")]
    Logs(String),

    /// Sandbox specification rejected
    #[error("configuration error: {0}")]
    Config(String),
}
