//! Sandbox handle - one live, exclusively owned container.

use crate::error::CoreError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use golf_sandbox::{ContainerId, ContainerLogs, ContainerRuntime, SandboxSpec};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SandboxId(Uuid);

impl SandboxId {
    /// Create a new random sandbox ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Name given to the backing container.
    pub fn container_name(&self) -> String {
        format!("golf-{}", self.0)
    }
}

impl Default for SandboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SandboxId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Current state of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    /// Container exists but has not been started.
    Created,
    /// Container is executing the build.
    Running,
    /// Container has stopped (on its own or killed).
    Exited,
    /// Container has been removed.
    Destroyed,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Exited => write!(f, "Exited"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// A live container owned by exactly one submission.
///
/// The handle must be [`destroy`](Self::destroy)ed; if it is dropped
/// first (for example because the request future was cancelled), the
/// removal is scheduled on the current tokio runtime instead.
pub struct SandboxHandle {
    id: SandboxId,
    container: ContainerId,
    runtime: Arc<dyn ContainerRuntime>,
    state: SandboxState,
    created_at: DateTime<Utc>,
}

impl SandboxHandle {
    /// Create the container for `spec`.
    ///
    /// Any runtime failure here means no environment exists, and is
    /// reported as [`CoreError::SandboxUnavailable`].
    pub(crate) async fn create(
        runtime: Arc<dyn ContainerRuntime>,
        spec: &SandboxSpec,
    ) -> Result<Self, CoreError> {
        let id = SandboxId::new();
        tracing::debug!(
            sandbox_id = %id,
            image = %spec.image,
            memory_bytes = spec.limits.memory_bytes,
            "Creating sandbox"
        );

        let container = runtime
            .create(spec, &id.container_name())
            .await
            .map_err(|e| {
                tracing::error!(sandbox_id = %id, error = %e, "Sandbox creation failed");
                CoreError::SandboxUnavailable(e.to_string())
            })?;

        tracing::debug!(sandbox_id = %id, container_id = %container, "Sandbox created");
        Ok(Self {
            id,
            container,
            runtime,
            state: SandboxState::Created,
            created_at: Utc::now(),
        })
    }

    /// Get the sandbox ID.
    pub fn id(&self) -> SandboxId {
        self.id
    }

    /// Get the runtime's container ID.
    pub fn container_id(&self) -> &ContainerId {
        &self.container
    }

    /// Get the current state.
    pub fn state(&self) -> SandboxState {
        self.state
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Unpack `archive` into `dest` before the container starts.
    pub(crate) async fn inject(&mut self, dest: &str, archive: Bytes) -> Result<(), CoreError> {
        self.ensure_state(SandboxState::Created)?;
        self.runtime
            .upload_archive(&self.container, dest, archive)
            .await
            .map_err(|e| CoreError::SandboxUnavailable(e.to_string()))
    }

    /// Start the container's entry point.
    pub(crate) async fn start(&mut self) -> Result<(), CoreError> {
        self.ensure_state(SandboxState::Created)?;
        self.runtime
            .start(&self.container)
            .await
            .map_err(|e| CoreError::SandboxUnavailable(e.to_string()))?;
        self.state = SandboxState::Running;
        Ok(())
    }

    /// Block until the container exits and return its exit code.
    pub(crate) async fn wait(&mut self) -> Result<i64, CoreError> {
        self.ensure_state(SandboxState::Running)?;
        let code = self.runtime.wait(&self.container).await?;
        self.state = SandboxState::Exited;
        Ok(code)
    }

    /// Mark the container as stopped without observing its exit.
    pub(crate) fn mark_exited(&mut self) {
        if self.state == SandboxState::Running {
            self.state = SandboxState::Exited;
        }
    }

    /// Collect the container's output.
    pub(crate) async fn logs(&self) -> Result<ContainerLogs, CoreError> {
        self.ensure_state(SandboxState::Exited)?;
        Ok(self.runtime.logs(&self.container).await?)
    }

    /// A detached action that kills this container, for the watchdog.
    pub(crate) fn killer(&self) -> impl FnOnce() -> KillFuture + Send + 'static {
        let runtime = Arc::clone(&self.runtime);
        let container = self.container.clone();
        let id = self.id;
        move || -> KillFuture {
            Box::pin(async move {
                if let Err(e) = runtime.kill(&container).await {
                    tracing::warn!(sandbox_id = %id, error = %e, "Failed to kill sandbox");
                }
            })
        }
    }

    /// Remove the container.
    ///
    /// Idempotent: once destroyed, further calls return `Ok` without
    /// touching the runtime.
    pub async fn destroy(&mut self) -> Result<(), CoreError> {
        if self.state == SandboxState::Destroyed {
            return Ok(());
        }
        let start = std::time::Instant::now();
        tracing::debug!(sandbox_id = %self.id, state = %self.state, "Destroying sandbox");
        self.state = SandboxState::Destroyed;

        self.runtime.remove(&self.container).await?;

        tracing::debug!(
            sandbox_id = %self.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sandbox destroyed"
        );
        Ok(())
    }

    /// Ensure the sandbox is in the given state.
    fn ensure_state(&self, expected: SandboxState) -> Result<(), CoreError> {
        if self.state != expected {
            return Err(CoreError::InvalidState {
                expected: expected.to_string(),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }
}

/// Future returned by [`SandboxHandle::killer`].
pub(crate) type KillFuture = std::pin::Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

impl Drop for SandboxHandle {
    fn drop(&mut self) {
        if self.state == SandboxState::Destroyed {
            return;
        }
        self.state = SandboxState::Destroyed;

        let runtime = Arc::clone(&self.runtime);
        let container = self.container.clone();
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(sandbox_id = %id, "Sandbox dropped before destroy, scheduling removal");
                handle.spawn(async move {
                    if let Err(e) = runtime.remove(&container).await {
                        tracing::error!(sandbox_id = %id, error = %e, "Deferred sandbox removal failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!(sandbox_id = %id, container_id = %container, "Sandbox leaked: no runtime to remove it");
            }
        }
    }
}
