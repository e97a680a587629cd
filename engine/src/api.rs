//! Engine capability interface.
//!
//! A `BackupSession` never calls SQLite directly. It drives an implementation
//! of `BackupApi`, which exposes exactly the primitives of the engine's
//! online backup facility. `NativeSqlite` binds the real library; tests
//! substitute a scripted engine.

use std::path::Path;
use std::time::Duration;

use crate::model::Status;

/// Logical database name targeted on both sides of a backup.
pub const MAIN_DATABASE: &str = "main";

/// How a database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file without write access
    ReadOnly,
    /// Open for writing, creating the file if it is absent
    ReadWriteCreate,
}

/// Primitives of the engine's online backup API.
///
/// Releasing a cursor or closing a connection consumes the handle, so a
/// handle cannot be released twice.
pub trait BackupApi {
    /// Open database connection.
    type Connection;
    /// In-progress page copy bound to a destination and source connection.
    type Cursor;

    /// Open `path` in `mode`.
    ///
    /// The engine may hand back a connection even when the status is not
    /// `Ok`; the caller must still close it.
    fn open(&self, path: &Path, mode: OpenMode) -> (Status, Option<Self::Connection>);

    /// Start copying `source_name` of `source` into `dest_name` of `dest`.
    fn backup_begin(
        &self,
        dest: &Self::Connection,
        dest_name: &str,
        source: &Self::Connection,
        source_name: &str,
    ) -> Option<Self::Cursor>;

    /// Copy up to `pages` pages.
    fn backup_step(&self, cursor: &mut Self::Cursor, pages: u32) -> Status;

    /// Pages still to copy as of the last step.
    fn backup_remaining(&self, cursor: &Self::Cursor) -> u32;

    /// Total pages in the source as of the last step.
    fn backup_pagecount(&self, cursor: &Self::Cursor) -> u32;

    /// Release the cursor. Its outcome is recorded on the destination connection.
    fn backup_finish(&self, cursor: Self::Cursor);

    /// Most recent result code recorded on `conn`.
    fn last_error_code(&self, conn: &Self::Connection) -> Status;

    fn close(&self, conn: Self::Connection);

    fn sleep(&self, duration: Duration);
}

/// Lets a caller lend an engine to a session and inspect it afterwards.
impl<T: BackupApi + ?Sized> BackupApi for &T {
    type Connection = T::Connection;
    type Cursor = T::Cursor;

    fn open(&self, path: &Path, mode: OpenMode) -> (Status, Option<Self::Connection>) {
        (**self).open(path, mode)
    }

    fn backup_begin(
        &self,
        dest: &Self::Connection,
        dest_name: &str,
        source: &Self::Connection,
        source_name: &str,
    ) -> Option<Self::Cursor> {
        (**self).backup_begin(dest, dest_name, source, source_name)
    }

    fn backup_step(&self, cursor: &mut Self::Cursor, pages: u32) -> Status {
        (**self).backup_step(cursor, pages)
    }

    fn backup_remaining(&self, cursor: &Self::Cursor) -> u32 {
        (**self).backup_remaining(cursor)
    }

    fn backup_pagecount(&self, cursor: &Self::Cursor) -> u32 {
        (**self).backup_pagecount(cursor)
    }

    fn backup_finish(&self, cursor: Self::Cursor) {
        (**self).backup_finish(cursor)
    }

    fn last_error_code(&self, conn: &Self::Connection) -> Status {
        (**self).last_error_code(conn)
    }

    fn close(&self, conn: Self::Connection) {
        (**self).close(conn)
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
