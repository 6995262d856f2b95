//! The capability set the executor needs from a container runtime.

use crate::error::Result;
use crate::spec::SandboxSpec;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Runtime-assigned identifier of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wrap a runtime-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form, as `docker ps` prints it.
        let short = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "{short}")
    }
}

/// Output captured from a finished container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLogs {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl ContainerLogs {
    /// Stdout followed by stderr, separated by a newline when both are present.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Operations on an isolated container.
///
/// Implementations must make `kill` and `remove` idempotent: killing a
/// container that already exited, or removing one that is already gone,
/// succeeds.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create (but do not start) a container matching `spec`.
    async fn create(&self, spec: &SandboxSpec, name: &str) -> Result<ContainerId>;

    /// Unpack a tar archive into `dest` inside the container.
    async fn upload_archive(&self, id: &ContainerId, dest: &str, archive: Bytes) -> Result<()>;

    /// Start the container's entry point.
    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Block until the container exits and return its exit code.
    async fn wait(&self, id: &ContainerId) -> Result<i64>;

    /// Forcibly terminate the container.
    async fn kill(&self, id: &ContainerId) -> Result<()>;

    /// Collect the container's output.
    async fn logs(&self, id: &ContainerId) -> Result<ContainerLogs>;

    /// Remove the container and its filesystem.
    async fn remove(&self, id: &ContainerId) -> Result<()>;
}
