//! HTTP request and response types.

use golf_core::{HighscoreEntry, SubmitResult};
use serde::Serialize;

// ============================================================================
// Highscores
// ============================================================================

/// One ranked row of the highscore list.
#[derive(Debug, Serialize)]
pub struct HighscoreRow {
    /// 1-based rank; equal sizes keep the earlier entry first.
    pub rank: usize,
    /// Contributor name.
    pub name: String,
    /// Best binary size in bytes.
    pub size: u64,
    /// When the size last improved (RFC 3339).
    pub updated_at: String,
}

/// Response of `GET /challenges/:challenge/highscores`.
#[derive(Debug, Serialize)]
pub struct HighscoresResponse {
    /// Challenge identifier.
    pub challenge: String,
    /// Ranked entries, best first.
    pub highscores: Vec<HighscoreRow>,
}

impl HighscoresResponse {
    /// Rank ledger entries, which arrive best first.
    pub fn from_entries(challenge: &str, entries: Vec<HighscoreEntry>) -> Self {
        let highscores = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| HighscoreRow {
                rank: i + 1,
                name: entry.name,
                size: entry.best_size,
                updated_at: entry.updated_at.to_rfc3339(),
            })
            .collect();
        Self {
            challenge: challenge.to_string(),
            highscores,
        }
    }
}

// ============================================================================
// Submissions
// ============================================================================

/// Response of `POST /challenges/:challenge/submit`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Challenge identifier.
    pub challenge: String,
    /// Contributor name.
    pub name: String,
    /// Status, detail and size.
    #[serde(flatten)]
    pub result: SubmitResult,
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// What went wrong.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
