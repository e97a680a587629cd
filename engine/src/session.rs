//! Backup session lifecycle.
//!
//! A `BackupSession` owns the two connections and the backup cursor between
//! them. Its lifecycle is:
//! - `init`: open the source read-only, open the destination for writing, and
//!   start the cursor
//! - `step`: copy a batch of pages, backing off on contention
//! - `finish`: release everything exactly once and report the outcome
//!
//! `run` drives all three and removes a destination the session created if
//! the backup fails. Dropping a session that was never finished releases its
//! resources.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{BackupApi, OpenMode, MAIN_DATABASE};
use crate::config::BackupOptions;
use crate::error::BackupError;
use crate::fs_ops;
use crate::model::{BackupReport, Progress, Status, StepOutcome};
use crate::native::NativeSqlite;
use crate::progress::ProgressCallback;
use crate::verify;

/// One online copy of a source database into a destination file.
pub struct BackupSession<E: BackupApi = NativeSqlite> {
    id: Uuid,
    engine: E,
    source_path: PathBuf,
    destination_path: PathBuf,
    options: BackupOptions,

    source: Option<E::Connection>,
    destination: Option<E::Connection>,
    cursor: Option<E::Cursor>,

    init_attempted: bool,
    destination_preexisted: Option<bool>,
    remaining_pages: Option<u32>,
    total_pages: Option<u32>,
    steps: u64,
    finished: bool,

    /// Destination status captured by the first `finish`
    teardown: Option<Status>,
}

impl BackupSession<NativeSqlite> {
    /// Create a session backed by the bundled SQLite library.
    ///
    /// No file is touched until `init`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> Self {
        Self::with_options(NativeSqlite, source, destination, BackupOptions::default())
    }
}

impl<E: BackupApi> BackupSession<E> {
    pub fn with_engine<P: AsRef<Path>, Q: AsRef<Path>>(engine: E, source: P, destination: Q) -> Self {
        Self::with_options(engine, source, destination, BackupOptions::default())
    }

    pub fn with_options<P: AsRef<Path>, Q: AsRef<Path>>(
        engine: E,
        source: P,
        destination: Q,
        options: BackupOptions,
    ) -> Self {
        BackupSession {
            id: Uuid::new_v4(),
            engine,
            source_path: source.as_ref().to_path_buf(),
            destination_path: destination.as_ref().to_path_buf(),
            options,
            source: None,
            destination: None,
            cursor: None,
            init_attempted: false,
            destination_preexisted: None,
            remaining_pages: None,
            total_pages: None,
            steps: 0,
            finished: false,
            teardown: None,
        }
    }

    /// Open both files and start the backup cursor.
    ///
    /// The source is opened first, then the destination. Whether the
    /// destination existed is recorded just before it is opened, since
    /// opening creates it.
    ///
    /// # Errors
    /// - `FileOpen` naming the path that failed; no cursor is created
    /// - `BackupInit` if the engine refuses to start the copy
    /// - `AlreadyInitialized` on a second call
    ///
    /// A connection opened before the failure stays on the session and is
    /// closed by `finish`.
    pub fn init(&mut self) -> Result<(), BackupError> {
        if self.init_attempted || self.teardown.is_some() {
            return Err(BackupError::AlreadyInitialized);
        }
        self.init_attempted = true;

        info!(
            session = %self.id,
            source = %self.source_path.display(),
            destination = %self.destination_path.display(),
            "starting backup session"
        );

        let (status, conn) = self.engine.open(&self.source_path, OpenMode::ReadOnly);
        self.source = conn;
        check_open(&self.source_path, status, self.source.is_some())?;

        self.destination_preexisted = Some(fs_ops::destination_exists(&self.destination_path));

        let (status, conn) = self.engine.open(&self.destination_path, OpenMode::ReadWriteCreate);
        self.destination = conn;
        check_open(&self.destination_path, status, self.destination.is_some())?;

        self.cursor = match (&self.destination, &self.source) {
            (Some(dest), Some(source)) => {
                self.engine.backup_begin(dest, MAIN_DATABASE, source, MAIN_DATABASE)
            }
            _ => None,
        };

        if self.cursor.is_none() {
            return Err(BackupError::BackupInit {
                source_path: self.source_path.clone(),
                destination_path: self.destination_path.clone(),
            });
        }

        debug!(
            session = %self.id,
            destination_preexisted = ?self.destination_preexisted,
            "backup cursor ready"
        );
        Ok(())
    }

    /// Copy up to `pages` pages (zero is treated as one).
    ///
    /// Page counters are refreshed after every engine step, including steps
    /// that hit contention. The session is finished only when the engine
    /// returns `Done`; a zero remaining count alone does not end the copy.
    ///
    /// `Ok`, `Busy` and `Locked` sleep for the configured backoff before
    /// returning. Handles are never released here.
    ///
    /// # Errors
    /// - `Uninitialized` if no cursor exists; the engine is not called
    /// - `StepFailed` for any status other than `Ok`, `Busy`, `Locked`, `Done`
    pub fn step(&mut self, pages: u32) -> Result<StepOutcome, BackupError> {
        let cursor = self.cursor.as_mut().ok_or(BackupError::Uninitialized)?;

        let status = self.engine.backup_step(cursor, pages.max(1));
        let remaining = self.engine.backup_remaining(cursor);
        let total = self.engine.backup_pagecount(cursor);

        self.steps += 1;
        self.remaining_pages = Some(remaining);
        self.total_pages = Some(total);

        match status {
            Status::Done => {
                self.finished = true;
                debug!(session = %self.id, step = self.steps, total, "all pages copied");
            }
            Status::Ok => {
                debug!(session = %self.id, step = self.steps, remaining, total, "step complete");
                self.engine.sleep(self.options.backoff);
            }
            Status::Busy | Status::Locked => {
                warn!(
                    session = %self.id,
                    step = self.steps,
                    %status,
                    remaining,
                    "source is contended, backing off"
                );
                self.engine.sleep(self.options.backoff);
            }
            Status::Other(_) => {
                warn!(session = %self.id, step = self.steps, %status, "backup step failed");
                return Err(BackupError::StepFailed { status });
            }
        }

        Ok(StepOutcome {
            status,
            remaining_pages: remaining,
            total_pages: total,
            finished: self.finished,
        })
    }

    /// Release the cursor and both connections, then report the outcome.
    ///
    /// Each resource is released only if it was acquired. The destination's
    /// last error code is read after the cursor is released and before the
    /// destination is closed.
    ///
    /// Calling `finish` again returns the first call's outcome without
    /// touching the engine. A session abandoned before `Done` usually closes
    /// cleanly; check `is_finished` to tell a complete copy apart.
    ///
    /// # Errors
    /// `BackupFailed` if the destination's last error code was not `Ok`
    pub fn finish(&mut self) -> Result<(), BackupError> {
        let status = match self.teardown {
            Some(status) => status,
            None => {
                let status = self.release();
                self.teardown = Some(status);
                status
            }
        };

        match status {
            Status::Ok => Ok(()),
            status => Err(BackupError::BackupFailed { status }),
        }
    }

    fn release(&mut self) -> Status {
        if let Some(cursor) = self.cursor.take() {
            self.engine.backup_finish(cursor);
        }

        let status = match &self.destination {
            Some(dest) => self.engine.last_error_code(dest),
            None => Status::Ok,
        };

        if let Some(dest) = self.destination.take() {
            self.engine.close(dest);
        }
        if let Some(source) = self.source.take() {
            self.engine.close(source);
        }

        debug!(session = %self.id, %status, "backup session closed");
        status
    }

    /// Run the whole backup: `init`, step until finished, `finish`.
    ///
    /// Steps use `options.step_pages`. If `options.max_steps` is set, the
    /// copy fails once that many steps ran without completing. If
    /// `options.verify` is set, the destination is integrity-checked after
    /// it is closed.
    ///
    /// On failure, a destination that did not exist before this session is
    /// deleted; removal problems are logged and never replace the backup
    /// error. A destination that already existed is left alone.
    ///
    /// # Errors
    /// The first error encountered, in the order init, step, finish, verify.
    pub fn run(
        &mut self,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<BackupReport, BackupError> {
        let started_at = Utc::now();

        let copied = self.init().and_then(|()| self.copy_pages(progress));
        let closed = self.finish();

        let result = match (copied, closed) {
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    warn!(session = %self.id, error = %close_err, "teardown also failed");
                }
                Err(err)
            }
            (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) if self.options.verify => {
                verify::integrity_check(&self.destination_path)
            }
            (Ok(()), Ok(())) => Ok(()),
        };

        if let Err(err) = result {
            if !err.is_usage_error() && self.destination_preexisted == Some(false) {
                self.discard_destination();
            }
            return Err(err);
        }

        let report = BackupReport {
            session_id: self.id,
            source_path: self.source_path.clone(),
            destination_path: self.destination_path.clone(),
            steps: self.steps,
            total_pages: self.total_pages.unwrap_or(0),
            destination_preexisted: self.destination_preexisted.unwrap_or(false),
            verified: self.options.verify,
            started_at,
            completed_at: Utc::now(),
        };

        info!(
            session = %self.id,
            steps = report.steps,
            pages = report.total_pages,
            "backup complete"
        );
        if let Some(callback) = progress {
            callback.on_backup_completed(&report);
        }

        Ok(report)
    }

    fn copy_pages(&mut self, progress: Option<&dyn ProgressCallback>) -> Result<(), BackupError> {
        if let Some(callback) = progress {
            callback.on_backup_started(&self.progress());
        }

        let pages = self.options.step_pages;
        while !self.finished {
            if let Some(limit) = self.options.max_steps {
                if self.steps >= limit {
                    return Err(BackupError::StepLimitExceeded { steps: self.steps });
                }
            }

            let outcome = self.step(pages)?;

            if let Some(callback) = progress {
                callback.on_step(&self.progress(), outcome.status);
            }
        }

        Ok(())
    }

    fn discard_destination(&self) {
        match fs_ops::remove_incomplete_destination(&self.destination_path) {
            Ok(true) => info!(
                session = %self.id,
                destination = %self.destination_path.display(),
                "removed incomplete destination"
            ),
            Ok(false) => {}
            Err(e) => warn!(
                session = %self.id,
                destination = %self.destination_path.display(),
                error = %e,
                "could not remove incomplete destination"
            ),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn options(&self) -> &BackupOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// True while a backup cursor is held.
    pub fn is_initialized(&self) -> bool {
        self.cursor.is_some()
    }

    /// True once the engine reported that every page was copied.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `None` until `init` reached the destination open.
    pub fn destination_preexisted(&self) -> Option<bool> {
        self.destination_preexisted
    }

    pub fn remaining_pages(&self) -> Option<u32> {
        self.remaining_pages
    }

    /// Source page count as of the last step. The source may still grow.
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn progress(&self) -> Progress {
        Progress {
            session_id: self.id,
            source_path: self.source_path.clone(),
            destination_path: self.destination_path.clone(),
            steps: self.steps,
            remaining_pages: self.remaining_pages,
            total_pages: self.total_pages,
            finished: self.finished,
        }
    }
}

impl<E: BackupApi> Drop for BackupSession<E> {
    fn drop(&mut self) {
        if self.teardown.is_none() {
            if let Err(e) = self.finish() {
                warn!(session = %self.id, error = %e, "backup session dropped with an error");
            }
        }
    }
}

fn check_open(path: &Path, status: Status, opened: bool) -> Result<(), BackupError> {
    if status != Status::Ok || !opened {
        return Err(BackupError::FileOpen {
            path: path.to_path_buf(),
            status,
        });
    }
    Ok(())
}

/// Back up `source` into `destination` with the bundled SQLite library.
///
/// Convenience wrapper around `BackupSession::run`.
pub fn run_backup<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    options: BackupOptions,
    progress: Option<&dyn ProgressCallback>,
) -> Result<BackupReport, BackupError> {
    BackupSession::with_options(NativeSqlite, source, destination, options).run(progress)
}
