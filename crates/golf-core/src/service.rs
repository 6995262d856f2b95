//! Submission service - stage, run, interpret, record.

use crate::config::ChallengeConfig;
use crate::controller::SandboxController;
use crate::error::CoreError;
use crate::ledger::{RecordOutcome, SqliteLedger};
use crate::measurement::Measurement;
use crate::stager;
use serde::Serialize;
use std::time::Instant;

/// One contributor's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Display name the highscore is kept under.
    pub name: String,
    /// Raw assembly source.
    pub source: Vec<u8>,
}

/// Final status reported to the contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// First successful entry for this name.
    Created,
    /// New personal best.
    Improved,
    /// Valid, but not smaller than the stored best.
    NotImproved,
    /// Build or check failed.
    BuildFailure,
    /// The deadline was exceeded.
    Timeout,
    /// No sandbox could be provisioned.
    SandboxUnavailable,
    /// Staging, runtime or ledger fault.
    InternalError,
}

/// What `submit` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResult {
    /// Final status.
    pub status: SubmitStatus,
    /// Human-readable detail: outcome message, diagnostic or reason.
    pub detail: String,
    /// Measured binary size, present when the build succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl SubmitResult {
    fn new(status: SubmitStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            size: None,
        }
    }
}

/// Verifies and scores submissions for one challenge.
#[derive(Clone)]
pub struct SubmissionService {
    controller: SandboxController,
    ledger: SqliteLedger,
    challenge: ChallengeConfig,
}

impl SubmissionService {
    /// Create a service for `challenge`.
    pub fn new(controller: SandboxController, ledger: SqliteLedger, challenge: ChallengeConfig) -> Self {
        Self {
            controller,
            ledger,
            challenge,
        }
    }

    /// The challenge this service scores.
    pub fn challenge(&self) -> &ChallengeConfig {
        &self.challenge
    }

    /// The highscore ledger.
    pub fn ledger(&self) -> &SqliteLedger {
        &self.ledger
    }

    /// Build, measure and record one submission.
    ///
    /// Never fails: every fault is mapped to a [`SubmitStatus`]. Nothing is
    /// retried.
    pub async fn submit(&self, submission: Submission) -> SubmitResult {
        let start = Instant::now();
        let challenge = self.challenge.id.as_str();
        tracing::info!(
            challenge,
            name = %submission.name,
            source_len = submission.source.len(),
            "Submission received"
        );

        let result = match self.verify(&submission).await {
            Ok(result) => result,
            Err(CoreError::SandboxUnavailable(reason)) => {
                tracing::error!(challenge, name = %submission.name, reason = %reason, "No sandbox available");
                SubmitResult::new(
                    SubmitStatus::SandboxUnavailable,
                    "the build environment is currently unavailable, please try again later",
                )
            }
            Err(e) => {
                tracing::error!(challenge, name = %submission.name, error = %e, "Submission failed");
                SubmitResult::new(SubmitStatus::InternalError, "internal error while verifying the submission")
            }
        };

        tracing::info!(
            challenge,
            name = %submission.name,
            status = ?result.status,
            size = ?result.size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Submission finished"
        );
        result
    }

    async fn verify(&self, submission: &Submission) -> Result<SubmitResult, CoreError> {
        let staged = stager::stage(&submission.source)?;
        let spec = self.challenge.sandbox_spec();

        let size = match self.controller.run(&spec, &staged).await? {
            Measurement::Success { size_bytes: 0 } => {
                return Ok(SubmitResult::new(
                    SubmitStatus::BuildFailure,
                    "the build reported a binary size of 0 bytes",
                ));
            }
            Measurement::Success { size_bytes } => size_bytes,
            Measurement::BuildFailure { diagnostic } if diagnostic.is_empty() => {
                return Ok(SubmitResult::new(
                    SubmitStatus::BuildFailure,
                    "the build failed without producing any output",
                ));
            }
            Measurement::BuildFailure { diagnostic } => {
                return Ok(SubmitResult::new(SubmitStatus::BuildFailure, diagnostic));
            }
            timeout @ Measurement::Timeout { .. } => {
                return Ok(SubmitResult::new(SubmitStatus::Timeout, timeout.to_string()));
            }
        };

        let outcome = self
            .ledger
            .record_if_better(&self.challenge.id, &submission.name, size)
            .await?;
        let status = match outcome {
            RecordOutcome::Created => SubmitStatus::Created,
            RecordOutcome::Improved { .. } => SubmitStatus::Improved,
            RecordOutcome::NotImproved { .. } => SubmitStatus::NotImproved,
        };

        Ok(SubmitResult {
            status,
            detail: outcome.message(size),
            size: Some(size),
        })
    }
}
