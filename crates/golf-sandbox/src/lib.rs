//! # golf-sandbox
//!
//! Container runtime layer for golf build-and-measure sandboxes.
//! Provides the capability set the executor needs from a container runtime
//! and a Docker implementation of it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use golf_sandbox::{ContainerRuntime, DockerRuntime, ResourceLimits, SandboxSpec};
//! use std::time::Duration;
//!
//! # async fn example() -> golf_sandbox::Result<()> {
//! let runtime = DockerRuntime::connect()?;
//!
//! let spec = SandboxSpec {
//!     image: "dbrgn/asm-codegolf".into(),
//!     command: vec!["bash".into(), "-c".into(), "make -s".into()],
//!     working_dir: "/home/compass/codegolf".into(),
//!     user: "compass".into(),
//!     limits: ResourceLimits::default(),
//!     deadline: Duration::from_secs(10),
//! };
//! spec.validate()?;
//!
//! let id = runtime.create(&spec, "golf-example").await?;
//! runtime.start(&id).await?;
//! let exit_code = runtime.wait(&id).await?;
//! let logs = runtime.logs(&id).await?;
//! println!("exit {exit_code}: {}", logs.stdout);
//!
//! runtime.remove(&id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Capability Trait**: `ContainerRuntime` is the only surface the executor depends on
//! - **Hard Limits**: Memory ceiling, no swap, no network, non-root user, pid cap
//! - **Archive Injection**: Inputs are uploaded as tar archives, never bind-mounted
//! - **Idempotent Cleanup**: Removing or killing a finished container is not an error

mod docker;
mod error;
mod runtime;
mod spec;

pub use docker::DockerRuntime;
pub use error::{Result, RuntimeError};
pub use runtime::{ContainerId, ContainerLogs, ContainerRuntime};
pub use spec::{ResourceLimits, SandboxSpec};
