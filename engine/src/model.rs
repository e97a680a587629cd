//! Core data model for backup sessions.
//!
//! This module defines the values a session exchanges with its callers:
//! - Status: an engine result code, classified for the step loop
//! - StepOutcome: what a single step observed
//! - Progress: a snapshot handed to progress callbacks
//! - BackupReport: the summary of a completed backup

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

const SQLITE_OK: i32 = 0;
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_DONE: i32 = 101;

/// A result code reported by the database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success; for a step this means more pages remain
    Ok,
    /// The database file is locked by another connection
    Busy,
    /// A table in the database is locked
    Locked,
    /// The backup copied every page
    Done,
    /// Any other code; fatal for the step loop
    Other(i32),
}

impl Status {
    /// Classify a raw engine code.
    ///
    /// Extended codes (such as `SQLITE_BUSY_SNAPSHOT`) classify by their
    /// primary code in the low byte.
    pub fn from_code(code: i32) -> Self {
        match code {
            SQLITE_OK => Self::Ok,
            SQLITE_DONE => Self::Done,
            _ => match code & 0xff {
                SQLITE_BUSY => Self::Busy,
                SQLITE_LOCKED => Self::Locked,
                _ => Self::Other(code),
            },
        }
    }

    /// The raw engine code. Extended busy/locked codes collapse to the primary code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => SQLITE_OK,
            Self::Busy => SQLITE_BUSY,
            Self::Locked => SQLITE_LOCKED,
            Self::Done => SQLITE_DONE,
            Self::Other(code) => *code,
        }
    }

    /// True for statuses the step loop retries after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Ok | Self::Busy | Self::Locked)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "SQLITE_OK (0)"),
            Self::Busy => write!(f, "SQLITE_BUSY (5)"),
            Self::Locked => write!(f, "SQLITE_LOCKED (6)"),
            Self::Done => write!(f, "SQLITE_DONE (101)"),
            Self::Other(code) => write!(f, "rc({})", code),
        }
    }
}

/// What a single successful `step` call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Status returned by the engine's step primitive
    pub status: Status,
    /// Pages still to copy, read right after the step
    pub remaining_pages: u32,
    /// Page count of the source as last measured by the engine
    pub total_pages: u32,
    /// True once the engine reported `Done`
    pub finished: bool,
}

/// Snapshot of a session's progress.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub session_id: Uuid,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    /// Number of step calls issued so far
    pub steps: u64,
    /// `None` until the first step
    pub remaining_pages: Option<u32>,
    /// `None` until the first step
    pub total_pages: Option<u32>,
    pub finished: bool,
}

impl Progress {
    /// Pages copied so far, by the engine's current estimate.
    pub fn copied_pages(&self) -> u32 {
        match (self.total_pages, self.remaining_pages) {
            (Some(total), Some(remaining)) => total.saturating_sub(remaining),
            _ => 0,
        }
    }

    /// Percentage complete in `0..=100`.
    ///
    /// The source may grow while the copy runs, so this can move backwards.
    pub fn percent(&self) -> u32 {
        if self.finished {
            return 100;
        }
        match self.total_pages {
            Some(total) if total > 0 => {
                ((self.copied_pages() as u64 * 100) / total as u64).min(100) as u32
            }
            _ => 0,
        }
    }
}

/// Summary of a backup that ran to completion.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub session_id: Uuid,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub steps: u64,
    /// Source page count at the time the copy finished
    pub total_pages: u32,
    pub destination_preexisted: bool,
    /// True if `PRAGMA integrity_check` ran and passed on the destination
    pub verified: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BackupReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}
