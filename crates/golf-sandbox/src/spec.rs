//! Sandbox specification types.

use crate::error::{Result, RuntimeError};
use std::time::Duration;

/// Whether `user` (`name`, `uid` or either with a `:group` suffix) runs as root.
///
/// An empty user part falls back to the image default, which is root.
fn is_privileged(user: &str) -> bool {
    let name = user.split(':').next().unwrap_or_default().trim();
    matches!(name, "" | "root" | "0")
}

/// Resource caps applied to every sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Hard memory ceiling in bytes (default: 32 MiB).
    pub memory_bytes: i64,
    /// Swap allowance on top of `memory_bytes`. Must be 0.
    pub swap_bytes: i64,
    /// Whether the container gets a network stack. Must be false.
    pub network_enabled: bool,
    /// Maximum number of processes inside the container (default: 64).
    pub pids_limit: i64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 32 * 1024 * 1024,
            swap_bytes: 0,
            network_enabled: false,
            pids_limit: 64,
        }
    }
}

/// Immutable configuration for one sandbox run.
///
/// A spec is built fresh for every submission and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSpec {
    /// Image the container is created from.
    pub image: String,
    /// Entry point command (argv form).
    pub command: Vec<String>,
    /// Absolute working directory; the input archive is unpacked here.
    pub working_dir: String,
    /// Non-root user the command runs as.
    pub user: String,
    /// Resource caps.
    pub limits: ResourceLimits,
    /// Wall-clock budget for the whole run.
    pub deadline: Duration,
}

impl SandboxSpec {
    /// Validate the specification against the isolation policy.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(RuntimeError::Config("image is required".into()));
        }
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(RuntimeError::Config("command is required".into()));
        }
        if !self.working_dir.starts_with('/') {
            return Err(RuntimeError::Config(format!(
                "working_dir must be absolute, got {:?}",
                self.working_dir
            )));
        }
        if is_privileged(&self.user) {
            return Err(RuntimeError::Config(format!(
                "user must be non-root, got {:?}",
                self.user
            )));
        }
        if self.limits.memory_bytes <= 0 {
            return Err(RuntimeError::Config("memory_bytes must be > 0".into()));
        }
        if self.limits.swap_bytes != 0 {
            return Err(RuntimeError::Config("swap must be disabled".into()));
        }
        if self.limits.network_enabled {
            return Err(RuntimeError::Config("network must be disabled".into()));
        }
        if self.limits.pids_limit <= 0 {
            return Err(RuntimeError::Config("pids_limit must be > 0".into()));
        }
        if self.deadline.is_zero() {
            return Err(RuntimeError::Config("deadline must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SandboxSpec {
        SandboxSpec {
            image: "dbrgn/asm-codegolf".into(),
            command: vec!["bash".into(), "-c".into(), "make -s".into()],
            working_dir: "/home/compass/codegolf".into(),
            user: "compass".into(),
            limits: ResourceLimits::default(),
            deadline: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_limits_defaults() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.memory_bytes, 32 * 1024 * 1024);
        assert_eq!(limits.swap_bytes, 0);
        assert!(!limits.network_enabled);
    }

    #[test]
    fn test_valid_spec() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn test_rejects_root_users() {
        for user in [
            "", "root", "0", "0:0", " root ", "0:1000", "root:users", "root:compass", ":1000",
        ] {
            let mut s = spec();
            s.user = user.into();
            assert!(s.validate().is_err(), "user {user:?} should be rejected");
        }
    }

    #[test]
    fn test_accepts_unprivileged_users() {
        for user in ["compass", "compass:compass", "1000", "1000:1000", "1000:0"] {
            let mut s = spec();
            s.user = user.into();
            assert!(s.validate().is_ok(), "user {user:?} should be accepted");
        }
    }

    #[test]
    fn test_rejects_network_and_swap() {
        let mut s = spec();
        s.limits.network_enabled = true;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.limits.swap_bytes = 1024;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_relative_working_dir() {
        let mut s = spec();
        s.working_dir = "codegolf".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_deadline_and_memory() {
        let mut s = spec();
        s.deadline = Duration::ZERO;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.limits.memory_bytes = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_command() {
        let mut s = spec();
        s.command.clear();
        assert!(s.validate().is_err());
    }
}
