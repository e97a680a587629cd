//! Error types for backup sessions.
//!
//! `BackupError` covers every condition that stops a session. Transient
//! engine statuses (`Ok` while more pages remain, `Busy`, `Locked`) are not
//! errors; `step` absorbs them with a backoff delay.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Status;

/// Errors that abort a backup session.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The engine could not open one of the two database files
    #[error("Unable to open file {}: {status}", path.display())]
    FileOpen { path: PathBuf, status: Status },

    /// Both files opened but the engine refused to create a backup cursor
    #[error(
        "Failed to start backup from {} to {}",
        source_path.display(),
        destination_path.display()
    )]
    BackupInit {
        source_path: PathBuf,
        destination_path: PathBuf,
    },

    /// `step` was called before `init` succeeded or after `finish`
    #[error("step called without a successful init")]
    Uninitialized,

    /// `init` was called on a session that already acquired resources
    #[error("init called twice on the same backup session")]
    AlreadyInitialized,

    /// The engine reported a non-retryable status while copying pages
    #[error("Backup step failed: {status}")]
    StepFailed { status: Status },

    /// The destination connection held an error when the session closed
    #[error("Failed to back up database: {status}")]
    BackupFailed { status: Status },

    /// `run` gave up after the configured number of steps
    #[error("Backup did not complete within {steps} steps")]
    StepLimitExceeded { steps: u64 },

    /// The finished destination failed `PRAGMA integrity_check`
    #[error("Integrity check failed for {}: {details}", path.display())]
    VerificationFailed { path: PathBuf, details: String },

    /// Error raised through the high-level rusqlite API
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl BackupError {
    /// The engine status carried by this error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::FileOpen { status, .. }
            | Self::StepFailed { status }
            | Self::BackupFailed { status } => Some(*status),
            _ => None,
        }
    }

    /// True for errors caused by calling the session API out of order.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::AlreadyInitialized)
    }
}
