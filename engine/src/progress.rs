//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which keeps the backup
//! engine independent of any UI technology. The CLI implements it to draw a
//! progress bar; other front ends can subscribe the same way.

use crate::model::{BackupReport, Progress, Status};

/// Trait for receiving progress updates from `BackupSession::run`.
///
/// All methods are called synchronously on the thread driving the session.
pub trait ProgressCallback: Send {
    /// Called once both files are open and the backup cursor exists.
    fn on_backup_started(&self, progress: &Progress);

    /// Called after every step that did not fail, with the step's status.
    fn on_step(&self, progress: &Progress, status: Status);

    /// Called once the session closed cleanly (and verification, if enabled, passed).
    fn on_backup_completed(&self, report: &BackupReport);
}
