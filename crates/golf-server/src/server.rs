//! GolfServer - shared state behind the HTTP handlers.
//!
//! Validates uploaded forms, hands submissions to the core service and
//! renders the highscore list.

use crate::config::MAX_NAME_CHARS;
use crate::types::HighscoresResponse;

use golf_core::{CoreError, SubmitResult, Submission, SubmissionService};

/// File extension accepted for uploaded sources.
const SOURCE_EXTENSION: &str = ".s";

/// Form fields as received, before validation.
#[derive(Debug, Default)]
pub struct SubmitForm {
    /// The `name` text field.
    pub name: Option<String>,
    /// File name of the `source` upload.
    pub file_name: Option<String>,
    /// Contents of the `source` upload.
    pub source: Option<Vec<u8>>,
}

impl SubmitForm {
    /// Check the form and turn it into a submission.
    ///
    /// Returns a message suitable for the contributor on failure.
    pub fn validate(self) -> Result<Submission, String> {
        let name = self.name.unwrap_or_default();
        let name = name.trim();
        if name.is_empty() {
            return Err("name is required".into());
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(format!("name must be at most {MAX_NAME_CHARS} characters"));
        }
        if name.chars().any(char::is_control) {
            return Err("name must not contain control characters".into());
        }

        let file_name = self.file_name.unwrap_or_default();
        if !file_name.ends_with(SOURCE_EXTENSION) {
            return Err("Assembly source code (.s) only!".into());
        }

        let source = self.source.unwrap_or_default();
        if source.is_empty() {
            return Err("source file is required".into());
        }

        Ok(Submission {
            name: name.to_string(),
            source,
        })
    }
}

/// State shared by all request handlers.
#[derive(Clone)]
pub struct GolfServer {
    service: SubmissionService,
}

impl GolfServer {
    /// Create a server around a submission service.
    pub fn new(service: SubmissionService) -> Self {
        Self { service }
    }

    /// Identifier of the challenge this server scores.
    pub fn challenge_id(&self) -> &str {
        &self.service.challenge().id
    }

    /// Check whether `challenge` is served here.
    pub fn serves(&self, challenge: &str) -> bool {
        self.challenge_id() == challenge
    }

    /// Verify and score one submission.
    pub async fn submit(&self, submission: Submission) -> SubmitResult {
        self.service.submit(submission).await
    }

    /// The current highscore list.
    pub async fn highscores(&self) -> Result<HighscoresResponse, CoreError> {
        let challenge = self.challenge_id();
        let entries = self.service.ledger().leaderboard(challenge).await?;
        tracing::debug!(challenge, entries = entries.len(), "Highscores loaded");
        Ok(HighscoresResponse::from_entries(challenge, entries))
    }
}
