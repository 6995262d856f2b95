//! Sandbox controller - runs one staged source through the build pipeline.
//!
//! # Lifecycle
//!
//! ```text
//! create ──▶ inject ──▶ start ──┬──▶ wait ─────────┬──▶ logs ──▶ interpret
//!                               │                  │
//!                               └──▶ watchdog ─────┘  (kill on deadline)
//!
//! destroy runs after every path, including errors after create.
//! ```

use crate::error::CoreError;
use crate::measurement::{interpret, Measurement};
use crate::sandbox::SandboxHandle;
use crate::stager::StagedSource;
use crate::watchdog::{Resolution, Watchdog};
use golf_sandbox::{ContainerRuntime, RuntimeError, SandboxSpec};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time allowed after the deadline for a killed container to report its exit.
///
/// Also bounds collecting the output of an exited container.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Runs submissions in freshly created, freshly destroyed sandboxes.
///
/// Sandboxes are never pooled or shared; each call to [`run`](Self::run)
/// owns exactly one container for its whole lifetime.
#[derive(Clone)]
pub struct SandboxController {
    runtime: Arc<dyn ContainerRuntime>,
}

impl SandboxController {
    /// Create a controller on top of a container runtime.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Build and measure `staged` in a sandbox configured by `spec`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidSpec`] if `spec` breaks the isolation policy.
    /// - [`CoreError::SandboxUnavailable`] if the container cannot be
    ///   created, loaded or started.
    /// - [`CoreError::Runtime`] if the runtime fails while the build runs.
    ///
    /// Build failures and timeouts are returned as [`Measurement`]s.
    pub async fn run(
        &self,
        spec: &SandboxSpec,
        staged: &StagedSource,
    ) -> Result<Measurement, CoreError> {
        spec.validate().map_err(CoreError::InvalidSpec)?;
        let start = Instant::now();

        let mut sandbox = SandboxHandle::create(Arc::clone(&self.runtime), spec).await?;
        let sandbox_id = sandbox.id();

        let result = Self::drive(&mut sandbox, spec, staged).await;

        if let Err(e) = sandbox.destroy().await {
            tracing::warn!(sandbox_id = %sandbox_id, error = %e, "Failed to destroy sandbox");
        }

        match &result {
            Ok(measurement) => tracing::info!(
                sandbox_id = %sandbox_id,
                measurement = %measurement,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Sandbox run finished"
            ),
            Err(e) => tracing::warn!(
                sandbox_id = %sandbox_id,
                error = %e,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Sandbox run failed"
            ),
        }
        result
    }

    /// Everything between create and destroy.
    async fn drive(
        sandbox: &mut SandboxHandle,
        spec: &SandboxSpec,
        staged: &StagedSource,
    ) -> Result<Measurement, CoreError> {
        // The input must exist before the entry point runs.
        sandbox.inject(&spec.working_dir, staged.archive()).await?;
        tracing::debug!(
            sandbox_id = %sandbox.id(),
            file = staged.file_name(),
            source_len = staged.source_len(),
            "Source injected"
        );

        sandbox.start().await?;
        let watchdog = Watchdog::arm(spec.deadline, sandbox.killer());
        tracing::debug!(sandbox_id = %sandbox.id(), "Sandbox started");

        let waited = tokio::time::timeout(spec.deadline + KILL_GRACE, sandbox.wait()).await;
        let resolution = watchdog.complete().await;

        let exit_code = match (resolution, waited) {
            (Resolution::Expired, _) => {
                sandbox.mark_exited();
                return Ok(interpret(true, -1, "", spec.deadline));
            }
            (Resolution::Completed, Ok(code)) => code?,
            (Resolution::Completed, Err(_)) => {
                return Err(RuntimeError::Wait("container did not report an exit status".into()).into());
            }
        };
        tracing::debug!(sandbox_id = %sandbox.id(), exit_code, "Sandbox exited");

        let logs = match tokio::time::timeout(KILL_GRACE, sandbox.logs()).await {
            Ok(logs) => logs?,
            Err(_) => {
                tracing::warn!(sandbox_id = %sandbox.id(), "Timed out collecting container output");
                return Err(RuntimeError::Logs("timed out collecting container output".into()).into());
            }
        };
        let output = if exit_code == 0 {
            logs.stdout
        } else {
            logs.combined()
        };
        Ok(interpret(false, exit_code, &output, spec.deadline))
    }
}
