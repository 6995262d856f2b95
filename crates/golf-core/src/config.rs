//! Challenge configuration types.

use crate::error::CoreError;
use golf_sandbox::{ResourceLimits, RuntimeError, SandboxSpec};
use std::time::Duration;

/// Configuration of one code golf challenge.
///
/// Everything that shapes the sandbox comes from here; submissions only
/// carry a name and a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeConfig {
    /// Challenge identifier, used as the ledger key (default: `asm-compass`).
    pub id: String,
    /// Build image (default: `dbrgn/asm-codegolf`).
    pub image: String,
    /// Shell command that builds, tests and prints the binary size.
    pub build_command: String,
    /// Unprivileged user inside the image (default: `compass`).
    pub user: String,
    /// Directory the source is placed in (default: `/home/compass/codegolf`).
    pub working_dir: String,
    /// Memory in MiB (default: 32).
    pub memory_mib: u32,
    /// Process limit (default: 64).
    pub pids_limit: i64,
    /// Wall-clock budget per submission (default: 10s).
    pub deadline: Duration,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            id: "asm-compass".into(),
            image: "dbrgn/asm-codegolf".into(),
            build_command: "make -s && python test.py --short".into(),
            user: "compass".into(),
            working_dir: "/home/compass/codegolf".into(),
            memory_mib: 32,
            pids_limit: 64,
            deadline: Duration::from_secs(10),
        }
    }
}

impl ChallengeConfig {
    /// Create a new config builder.
    pub fn builder() -> ChallengeConfigBuilder {
        ChallengeConfigBuilder::default()
    }

    /// Build the sandbox spec for one submission.
    ///
    /// A new spec is produced on every call; callers never share one
    /// between runs.
    pub fn sandbox_spec(&self) -> SandboxSpec {
        SandboxSpec {
            image: self.image.clone(),
            command: vec!["bash".into(), "-c".into(), self.build_command.clone()],
            working_dir: self.working_dir.clone(),
            user: self.user.clone(),
            limits: ResourceLimits {
                memory_bytes: i64::from(self.memory_mib) * 1024 * 1024,
                pids_limit: self.pids_limit,
                ..ResourceLimits::default()
            },
            deadline: self.deadline,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidSpec(RuntimeError::Config(
                "challenge id is required".into(),
            )));
        }
        if self.build_command.trim().is_empty() {
            return Err(CoreError::InvalidSpec(RuntimeError::Config(
                "build command is required".into(),
            )));
        }
        self.sandbox_spec().validate().map_err(CoreError::InvalidSpec)
    }
}

/// Builder for ChallengeConfig.
#[derive(Debug, Default)]
pub struct ChallengeConfigBuilder {
    config: ChallengeConfig,
}

impl ChallengeConfigBuilder {
    /// Set the challenge identifier.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the build image.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.config.image = image.into();
        self
    }

    /// Set the build command (run through `bash -c`).
    pub fn build_command(mut self, command: impl Into<String>) -> Self {
        self.config.build_command = command.into();
        self
    }

    /// Set the user the build runs as.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.working_dir = dir.into();
        self
    }

    /// Set memory in MiB.
    pub fn memory_mib(mut self, mib: u32) -> Self {
        self.config.memory_mib = mib;
        self
    }

    /// Set the process limit.
    pub fn pids_limit(mut self, limit: i64) -> Self {
        self.config.pids_limit = limit;
        self
    }

    /// Set the per-submission deadline.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = deadline;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<ChallengeConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
