//! # golf-core
//!
//! Build-and-measure executor and highscore ledger for code golf challenges.
//!
//! A submission is packed into an archive, built and checked inside a
//! freshly created sandbox under a hard deadline, and its binary size is
//! recorded if it beats the contributor's previous best.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 golf-core (host process)                 │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌───────────────────┐    ┌──────────────────────────┐   │
//! │  │ SubmissionService │───▶│  stager::stage()         │   │
//! │  │   - submit()      │    │  (in-memory tar)         │   │
//! │  └───────────────────┘    └──────────────────────────┘   │
//! │       │          │                                       │
//! │       │          ▼                                       │
//! │       │   ┌───────────────────┐   ┌──────────────────┐   │
//! │       │   │ SandboxController │──▶│  SandboxHandle   │   │
//! │       │   │   - run()         │   │  + Watchdog      │   │
//! │       │   └───────────────────┘   └──────────────────┘   │
//! │       │          │                        │              │
//! │       │          ▼                        ▼              │
//! │       │   interpret() ──▶ Measurement   ContainerRuntime │
//! │       ▼                                 (golf-sandbox)   │
//! │  ┌───────────────────┐                                   │
//! │  │   SqliteLedger    │                                   │
//! │  │ - record_if_better│                                   │
//! │  └───────────────────┘                                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use golf_core::{ChallengeConfig, SandboxController, SqliteLedger, Submission, SubmissionService};
//! use golf_sandbox::DockerRuntime;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(DockerRuntime::connect()?);
//! let service = SubmissionService::new(
//!     SandboxController::new(runtime),
//!     SqliteLedger::open("highscore.db")?,
//!     ChallengeConfig::default(),
//! );
//!
//! let result = service
//!     .submit(Submission {
//!         name: "alice".into(),
//!         source: std::fs::read("compass.s")?,
//!     })
//!     .await;
//! println!("{:?}: {}", result.status, result.detail);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **One Sandbox Per Run**: Containers are never pooled or reused
//! - **Guaranteed Cleanup**: Every created container is removed exactly once
//! - **Hard Deadline**: A watchdog kills runs that exceed their budget
//! - **Atomic Highscores**: Read-compare-write under an immediate SQLite transaction

mod config;
mod controller;
mod error;
mod ledger;
mod measurement;
mod sandbox;
mod service;
mod stager;
mod watchdog;

pub use config::{ChallengeConfig, ChallengeConfigBuilder};
pub use controller::{SandboxController, KILL_GRACE};
pub use error::{CoreError, Result};
pub use ledger::{Attempt, HighscoreEntry, RecordOutcome, SqliteLedger};
pub use measurement::{interpret, Measurement, MAX_DIAGNOSTIC_BYTES};
pub use sandbox::{SandboxHandle, SandboxId, SandboxState};
pub use service::{SubmitResult, SubmitStatus, Submission, SubmissionService};
pub use stager::{stage, StagedSource, SOURCE_FILE_NAME};
pub use watchdog::{OutcomeSlot, Resolution, Watchdog};
