//! Configuration for the golf server.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use golf_core::ChallengeConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum request body size (64 KiB).
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Maximum length of a contributor name in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Configuration for the golf server.
#[derive(Debug, Clone)]
pub struct GolfConfig {
    /// Path to the highscore database.
    pub database_path: PathBuf,

    /// Identifier of the challenge being served.
    pub challenge_id: String,

    /// Build image for the challenge.
    pub image: String,

    /// Sandbox memory in MiB (default: 32).
    pub memory_mib: u32,

    /// Wall-clock budget per submission (default: 10s).
    pub deadline: Duration,

    /// HTTP server bind address.
    pub http_addr: SocketAddr,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("database directory not found: {0}")]
    MissingDatabaseDir(PathBuf),

    #[error("memory_mib must be > 0")]
    ZeroMemory,

    #[error("deadline must be > 0")]
    ZeroDeadline,

    #[error("invalid challenge configuration: {0}")]
    InvalidChallenge(#[from] golf_core::CoreError),
}

impl Default for GolfConfig {
    fn default() -> Self {
        let challenge = ChallengeConfig::default();
        Self {
            database_path: PathBuf::from("highscore.db"),
            challenge_id: challenge.id,
            image: challenge.image,
            memory_mib: challenge.memory_mib,
            deadline: challenge.deadline,
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080),
        }
    }
}

impl GolfConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GOLF_DATABASE` | `highscore.db` |
    /// | `GOLF_CHALLENGE` | `asm-compass` |
    /// | `GOLF_IMAGE` | `dbrgn/asm-codegolf` |
    /// | `GOLF_MEMORY_MIB` | `32` |
    /// | `GOLF_DEADLINE_SECS` | `10` |
    /// | `GOLF_HTTP_HOST` | `0.0.0.0` |
    /// | `GOLF_HTTP_PORT` | `8080` |
    pub fn from_env() -> Self {
        let default = Self::default();

        let http_host: IpAddr = std::env::var("GOLF_HTTP_HOST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.http_addr.ip());

        let http_port: u16 = std::env::var("GOLF_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.http_addr.port());

        Self {
            database_path: std::env::var("GOLF_DATABASE")
                .map(PathBuf::from)
                .unwrap_or(default.database_path),
            challenge_id: std::env::var("GOLF_CHALLENGE").unwrap_or(default.challenge_id),
            image: std::env::var("GOLF_IMAGE").unwrap_or(default.image),
            memory_mib: std::env::var("GOLF_MEMORY_MIB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.memory_mib),
            deadline: std::env::var("GOLF_DEADLINE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.deadline),
            http_addr: SocketAddr::new(http_host, http_port),
        }
    }

    /// Build the challenge configuration served by this process.
    pub fn challenge(&self) -> Result<ChallengeConfig, ConfigError> {
        Ok(ChallengeConfig::builder()
            .id(&self.challenge_id)
            .image(&self.image)
            .memory_mib(self.memory_mib)
            .deadline(self.deadline)
            .build()?)
    }

    /// Validate the configuration.
    ///
    /// Call this at startup to get clear error messages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_mib == 0 {
            return Err(ConfigError::ZeroMemory);
        }
        if self.deadline.is_zero() {
            return Err(ConfigError::ZeroDeadline);
        }

        // The database file is created on demand, so just check its directory
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::MissingDatabaseDir(parent.to_path_buf()));
            }
        }

        self.challenge()?;
        Ok(())
    }

    /// Validate configuration but only log warnings instead of failing.
    pub fn validate_warn(&self) {
        if let Err(e) = self.validate() {
            tracing::warn!(error = %e, "Configuration problem");
        }
        if self.deadline > Duration::from_secs(60) {
            tracing::warn!(
                deadline_secs = self.deadline.as_secs(),
                "Long deadline, a stuck build holds a container that long"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GolfConfig::default();
        assert_eq!(config.database_path, PathBuf::from("highscore.db"));
        assert_eq!(config.challenge_id, "asm-compass");
        assert_eq!(config.image, "dbrgn/asm-codegolf");
        assert_eq!(config.memory_mib, 32);
        assert_eq!(config.deadline, Duration::from_secs(10));
        assert_eq!(config.http_addr.port(), 8080);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GolfConfig::default();
        assert!(config.validate().is_ok());

        let challenge = config.challenge().unwrap();
        assert_eq!(challenge.id, "asm-compass");
        assert_eq!(challenge.sandbox_spec().limits.memory_bytes, 32 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = GolfConfig {
            memory_mib: 0,
            ..GolfConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroMemory)));

        let config = GolfConfig {
            deadline: Duration::ZERO,
            ..GolfConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroDeadline)));
    }

    #[test]
    fn test_validate_rejects_missing_database_dir() {
        let config = GolfConfig {
            database_path: PathBuf::from("/nonexistent/golf/highscore.db"),
            ..GolfConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingDatabaseDir(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_image() {
        let config = GolfConfig {
            image: " ".into(),
            ..GolfConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChallenge(_))
        ));
    }

    #[test]
    fn test_from_env_uses_defaults() {
        // Clear any existing env vars
        for var in [
            "GOLF_DATABASE",
            "GOLF_CHALLENGE",
            "GOLF_IMAGE",
            "GOLF_MEMORY_MIB",
            "GOLF_DEADLINE_SECS",
            "GOLF_HTTP_HOST",
            "GOLF_HTTP_PORT",
        ] {
            std::env::remove_var(var);
        }

        let config = GolfConfig::from_env();
        let default = GolfConfig::default();

        assert_eq!(config.database_path, default.database_path);
        assert_eq!(config.challenge_id, default.challenge_id);
        assert_eq!(config.deadline, default.deadline);
        assert_eq!(config.http_addr, default.http_addr);
    }
}
