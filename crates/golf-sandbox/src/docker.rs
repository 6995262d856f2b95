//! Docker implementation of [`ContainerRuntime`] using bollard.

use crate::error::{Result, RuntimeError};
use crate::runtime::{ContainerId, ContainerLogs, ContainerRuntime};
use crate::spec::{ResourceLimits, SandboxSpec};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::HostConfig;
use bollard::Docker;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;

/// Maximum bytes kept per output stream (1 MB).
/// Prevents memory exhaustion from submissions that flood stdout.
const MAX_LOG_BYTES: usize = 1024 * 1024;

/// Label attached to every container created by this runtime.
const SANDBOX_LABEL: &str = "golf.sandbox";

/// Container runtime backed by the local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the Docker daemon using the local defaults
    /// (`DOCKER_HOST` or the platform socket).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Connect(e.to_string()))?;
        tracing::debug!("Docker client configured");
        Ok(Self { docker })
    }

    /// Wrap an already configured client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// Check that the daemon answers.
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Connect(e.to_string()))?;
        Ok(())
    }
}

/// Host-side isolation settings derived from the resource limits.
fn host_config(limits: &ResourceLimits) -> HostConfig {
    HostConfig {
        memory: Some(limits.memory_bytes),
        // Docker counts swap as `memory_swap - memory`.
        memory_swap: Some(limits.memory_bytes + limits.swap_bytes),
        pids_limit: Some(limits.pids_limit),
        network_mode: Some(if limits.network_enabled { "bridge" } else { "none" }.to_string()),
        cap_drop: Some(vec!["ALL".to_string()]),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        privileged: Some(false),
        ..Default::default()
    }
}

/// Full container configuration for a sandbox spec.
fn container_config(spec: &SandboxSpec) -> Config<String> {
    Config {
        image: Some(spec.image.clone()),
        cmd: Some(spec.command.clone()),
        user: Some(spec.user.clone()),
        working_dir: Some(spec.working_dir.clone()),
        network_disabled: Some(!spec.limits.network_enabled),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        labels: Some(HashMap::from([(
            SANDBOX_LABEL.to_string(),
            "true".to_string(),
        )])),
        host_config: Some(host_config(&spec.limits)),
        ..Default::default()
    }
}

/// Whether a Docker error means the target is already in the requested state.
fn is_already_done(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404 | 409,
            ..
        }
    )
}

/// Whether a capped buffer accepts no more output.
fn is_full(buf: &str) -> bool {
    buf.len() >= MAX_LOG_BYTES
}

/// Append a chunk to a capped buffer, preserving UTF-8 boundaries.
fn push_capped(buf: &mut String, chunk: &[u8]) {
    if is_full(buf) {
        return;
    }
    let text = String::from_utf8_lossy(chunk);
    let room = MAX_LOG_BYTES - buf.len();
    if text.len() <= room {
        buf.push_str(&text);
        return;
    }
    let mut end = room;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    buf.push_str(&text[..end]);
    buf.push_str("\n... [output truncated]");
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &SandboxSpec, name: &str) -> Result<ContainerId> {
        spec.validate()?;
        tracing::debug!(
            name = %name,
            image = %spec.image,
            memory_bytes = spec.limits.memory_bytes,
            "Creating container"
        );

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };
        let response = self
            .docker
            .create_container(Some(options), container_config(spec))
            .await
            .map_err(|e| RuntimeError::Create(e.to_string()))?;

        for warning in &response.warnings {
            tracing::warn!(name = %name, warning = %warning, "Docker warning on create");
        }

        let id = ContainerId::new(response.id);
        tracing::debug!(container_id = %id, name = %name, "Container created");
        Ok(id)
    }

    async fn upload_archive(&self, id: &ContainerId, dest: &str, archive: Bytes) -> Result<()> {
        tracing::debug!(container_id = %id, dest = %dest, size = archive.len(), "Uploading archive");
        let options = UploadToContainerOptions {
            path: dest.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id.as_str(), Some(options), archive)
            .await
            .map_err(|e| RuntimeError::Upload(e.to_string()))
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        tracing::debug!(container_id = %id, "Starting container");
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::Start(e.to_string()))
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(id.as_str(), Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit status as an error.
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RuntimeError::Wait(e.to_string())),
            None => Err(RuntimeError::Wait("wait stream closed without status".into())),
        }
    }

    async fn kill(&self, id: &ContainerId) -> Result<()> {
        tracing::debug!(container_id = %id, "Killing container");
        match self
            .docker
            .kill_container(id.as_str(), None::<KillContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_already_done(&e) => {
                tracing::debug!(container_id = %id, error = %e, "Container already stopped");
                Ok(())
            }
            Err(e) => Err(RuntimeError::Kill(e.to_string())),
        }
    }

    async fn logs(&self, id: &ContainerId) -> Result<ContainerLogs> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            tail: "all".to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(id.as_str(), Some(options));

        let mut logs = ContainerLogs::default();
        while let Some(chunk) = stream.next().await {
            match chunk.map_err(|e| RuntimeError::Logs(e.to_string()))? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    push_capped(&mut logs.stdout, &message)
                }
                LogOutput::StdErr { message } => push_capped(&mut logs.stderr, &message),
                LogOutput::StdIn { .. } => {}
            }
            // The rest of the stream would be discarded anyway.
            if is_full(&logs.stdout) && is_full(&logs.stderr) {
                tracing::debug!(container_id = %id, "Log cap reached, dropping remaining output");
                break;
            }
        }

        tracing::trace!(
            container_id = %id,
            stdout_len = logs.stdout.len(),
            stderr_len = logs.stderr.len(),
            "Container logs collected"
        );
        Ok(logs)
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        tracing::debug!(container_id = %id, "Removing container");
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self
            .docker
            .remove_container(id.as_str(), Some(options))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_already_done(&e) => {
                tracing::debug!(container_id = %id, error = %e, "Container already removed");
                Ok(())
            }
            Err(e) => Err(RuntimeError::Remove(e.to_string())),
        }
    }
}
