//! Highscore ledger backed by SQLite.
//!
//! One row per `(challenge, name)` holds the smallest binary size that
//! contributor has achieved. Every update is a single immediate
//! transaction: the write lock is taken *before* the current best is read,
//! so concurrent submissions for the same key are evaluated one after the
//! other against the latest committed value, even across processes that
//! share the database file.
//!
//! # Schema
//!
//! `highscores(id, challenge, name, best_size, created_at, updated_at)`
//! with `UNIQUE(challenge, name)` and `CHECK(best_size > 0)`.
//!
//! `attempts(id, challenge, name, size, outcome, recorded_at)` keeps every
//! measured size, including the ones that did not improve the highscore.
//!
//! Timestamps are stored as Unix microseconds.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long a writer waits for another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS highscores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        challenge TEXT NOT NULL,
        name TEXT NOT NULL,
        best_size INTEGER NOT NULL CHECK (best_size > 0),
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (challenge, name)
    );
    CREATE INDEX IF NOT EXISTS highscores_ranking
        ON highscores (challenge, best_size, updated_at);
    CREATE TABLE IF NOT EXISTS attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        challenge TEXT NOT NULL,
        name TEXT NOT NULL,
        size INTEGER NOT NULL,
        outcome TEXT NOT NULL,
        recorded_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS attempts_by_key ON attempts (challenge, name);
";

/// Result of offering a new size to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// First successful measurement for this key.
    Created,
    /// The new size beat the stored one.
    Improved {
        /// Best size before this submission.
        previous: u64,
    },
    /// The stored size is smaller or equal; nothing changed.
    NotImproved {
        /// The best size on record.
        current_best: u64,
    },
}

impl RecordOutcome {
    /// Short machine-readable name, as stored in the audit table.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Improved { .. } => "improved",
            Self::NotImproved { .. } => "not_improved",
        }
    }

    /// User-facing description of the outcome for a submitted `size`.
    pub fn message(&self, size: u64) -> String {
        match self {
            Self::Created => "added your entry to the highscore list.".to_string(),
            Self::Improved { previous } => {
                format!("updated score from {previous} to {size}.")
            }
            Self::NotImproved { current_best } => format!(
                "binary size ({size}) is not smaller than the currently stored value ({current_best})."
            ),
        }
    }
}

/// One row of the highscore table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighscoreEntry {
    /// Challenge identifier.
    pub challenge: String,
    /// Contributor display name.
    pub name: String,
    /// Smallest binary size achieved.
    pub best_size: u64,
    /// When the entry was first created.
    pub created_at: DateTime<Utc>,
    /// When `best_size` last improved.
    pub updated_at: DateTime<Utc>,
}

/// One measured submission, kept for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// Challenge identifier.
    pub challenge: String,
    /// Contributor display name.
    pub name: String,
    /// Measured binary size.
    pub size: u64,
    /// Outcome kind (`created`, `improved`, `not_improved`).
    pub outcome: String,
    /// When the measurement was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// SQLite-backed highscore ledger.
///
/// Cheap to clone; clones share one connection. Blocking database work
/// runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open (or create) a ledger database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::info!(path = %path.display(), "Highscore ledger opened");
        Self::with_connection(conn)
    }

    /// Open a private in-memory ledger.
    pub fn open_in_memory() -> Result<Self, CoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply `size` to the `(challenge, name)` highscore if it is smaller
    /// than the stored one, creating the entry on first success.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidSize`] for a size of 0 (or one that does not fit
    /// the database), and database errors. `NotImproved` is not an error.
    pub async fn record_if_better(
        &self,
        challenge: &str,
        name: &str,
        size: u64,
    ) -> Result<RecordOutcome, CoreError> {
        let stored = match i64::try_from(size) {
            Ok(v) if v > 0 => v,
            _ => return Err(CoreError::InvalidSize(size)),
        };
        let challenge = challenge.to_string();
        let name = name.to_string();

        let outcome = self
            .with_conn(move |conn| record_blocking(conn, &challenge, &name, stored))
            .await?;

        tracing::info!(size, outcome = outcome.kind(), "Highscore ledger updated");
        Ok(outcome)
    }

    /// All entries of a challenge, best first; ties go to the earlier entry.
    pub async fn leaderboard(&self, challenge: &str) -> Result<Vec<HighscoreEntry>, CoreError> {
        let challenge = challenge.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT challenge, name, best_size, created_at, updated_at FROM highscores
                 WHERE challenge = ?1
                 ORDER BY best_size ASC, updated_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![challenge], map_entry)?;
            rows.collect()
        })
        .await
    }

    /// Look up one entry.
    pub async fn entry(
        &self,
        challenge: &str,
        name: &str,
    ) -> Result<Option<HighscoreEntry>, CoreError> {
        let challenge = challenge.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT challenge, name, best_size, created_at, updated_at FROM highscores
                 WHERE challenge = ?1 AND name = ?2",
                params![challenge, name],
                map_entry,
            )
            .optional()
        })
        .await
    }

    /// Every recorded measurement for a key, oldest first.
    pub async fn attempts(&self, challenge: &str, name: &str) -> Result<Vec<Attempt>, CoreError> {
        let challenge = challenge.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT challenge, name, size, outcome, recorded_at FROM attempts
                 WHERE challenge = ?1 AND name = ?2
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![challenge, name], |row| {
                Ok(Attempt {
                    challenge: row.get(0)?,
                    name: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    outcome: row.get(3)?,
                    recorded_at: from_micros(row.get(4)?),
                })
            })?;
            rows.collect()
        })
        .await
    }

    /// Run `f` with the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn);
            f(&mut guard)
        })
        .await?;
        Ok(result?)
    }
}

/// Lock the connection; a panic mid-transaction leaves nothing committed,
/// so a poisoned lock is still usable.
fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record_blocking(
    conn: &mut Connection,
    challenge: &str,
    name: &str,
    size: i64,
) -> rusqlite::Result<RecordOutcome> {
    let now = Utc::now().timestamp_micros();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current: Option<i64> = tx
        .query_row(
            "SELECT best_size FROM highscores WHERE challenge = ?1 AND name = ?2",
            params![challenge, name],
            |row| row.get(0),
        )
        .optional()?;

    let outcome = match current {
        None => {
            tx.execute(
                "INSERT INTO highscores (challenge, name, best_size, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![challenge, name, size, now],
            )?;
            RecordOutcome::Created
        }
        Some(best) if size < best => {
            tx.execute(
                "UPDATE highscores SET best_size = ?3, updated_at = ?4
                 WHERE challenge = ?1 AND name = ?2 AND best_size > ?3",
                params![challenge, name, size, now],
            )?;
            RecordOutcome::Improved {
                previous: best as u64,
            }
        }
        Some(best) => RecordOutcome::NotImproved {
            current_best: best as u64,
        },
    };

    tx.execute(
        "INSERT INTO attempts (challenge, name, size, outcome, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![challenge, name, size, outcome.kind(), now],
    )?;
    tx.commit()?;
    Ok(outcome)
}

fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HighscoreEntry> {
    Ok(HighscoreEntry {
        challenge: row.get(0)?,
        name: row.get(1)?,
        best_size: row.get::<_, i64>(2)? as u64,
        created_at: from_micros(row.get(3)?),
        updated_at: from_micros(row.get(4)?),
    })
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}
