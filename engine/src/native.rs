//! `BackupApi` over the bundled SQLite library.
//!
//! Calls go straight to the `sqlite3_*` entry points re-exported by
//! `rusqlite::ffi`. Connection and cursor handles are non-null wrappers owned
//! by the session; they are released only through `backup_finish` and
//! `close`.

use rusqlite::ffi;
use std::ffi::CString;
use std::os::raw::c_int;
use std::path::Path;
use std::ptr::{self, NonNull};
use std::time::Duration;

use crate::api::{BackupApi, OpenMode};
use crate::model::Status;

/// Raw SQLite connection handle.
#[derive(Debug)]
pub struct NativeConnection(NonNull<ffi::sqlite3>);

/// Raw `sqlite3_backup` handle.
#[derive(Debug)]
pub struct NativeCursor(NonNull<ffi::sqlite3_backup>);

/// The real SQLite engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSqlite;

impl NativeSqlite {
    pub fn new() -> Self {
        NativeSqlite
    }
}

fn to_c_int(value: u32) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

fn to_u32(value: c_int) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl BackupApi for NativeSqlite {
    type Connection = NativeConnection;
    type Cursor = NativeCursor;

    fn open(&self, path: &Path, mode: OpenMode) -> (Status, Option<NativeConnection>) {
        // SQLite takes UTF-8 file names without interior NULs.
        let c_path = match path.to_str().map(CString::new) {
            Some(Ok(c_path)) => c_path,
            _ => return (Status::from_code(ffi::SQLITE_CANTOPEN), None),
        };

        let flags = match mode {
            OpenMode::ReadOnly => ffi::SQLITE_OPEN_READONLY,
            OpenMode::ReadWriteCreate => ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE,
        };

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: c_path is a valid NUL-terminated string and db is a valid out pointer.
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        (Status::from_code(rc), NonNull::new(db).map(NativeConnection))
    }

    fn backup_begin(
        &self,
        dest: &NativeConnection,
        dest_name: &str,
        source: &NativeConnection,
        source_name: &str,
    ) -> Option<NativeCursor> {
        let dest_name = CString::new(dest_name).ok()?;
        let source_name = CString::new(source_name).ok()?;

        // SAFETY: both connections are open handles owned by the caller.
        let cursor = unsafe {
            ffi::sqlite3_backup_init(
                dest.0.as_ptr(),
                dest_name.as_ptr(),
                source.0.as_ptr(),
                source_name.as_ptr(),
            )
        };

        NonNull::new(cursor).map(NativeCursor)
    }

    fn backup_step(&self, cursor: &mut NativeCursor, pages: u32) -> Status {
        // SAFETY: the cursor has not been finished; finishing consumes it.
        let rc = unsafe { ffi::sqlite3_backup_step(cursor.0.as_ptr(), to_c_int(pages)) };
        Status::from_code(rc)
    }

    fn backup_remaining(&self, cursor: &NativeCursor) -> u32 {
        // SAFETY: see backup_step.
        to_u32(unsafe { ffi::sqlite3_backup_remaining(cursor.0.as_ptr()) })
    }

    fn backup_pagecount(&self, cursor: &NativeCursor) -> u32 {
        // SAFETY: see backup_step.
        to_u32(unsafe { ffi::sqlite3_backup_pagecount(cursor.0.as_ptr()) })
    }

    fn backup_finish(&self, cursor: NativeCursor) {
        // The return code is mirrored into the destination's error state,
        // which the session reads next.
        // SAFETY: the cursor is consumed here and never used again.
        unsafe {
            ffi::sqlite3_backup_finish(cursor.0.as_ptr());
        }
    }

    fn last_error_code(&self, conn: &NativeConnection) -> Status {
        // SAFETY: the connection is open.
        Status::from_code(unsafe { ffi::sqlite3_errcode(conn.0.as_ptr()) })
    }

    fn close(&self, conn: NativeConnection) {
        // SAFETY: the connection is consumed here; any cursor bound to it was finished first.
        unsafe {
            ffi::sqlite3_close(conn.0.as_ptr());
        }
    }

    fn sleep(&self, duration: Duration) {
        let millis = c_int::try_from(duration.as_millis()).unwrap_or(c_int::MAX);
        // SAFETY: sqlite3_sleep has no pointer arguments.
        unsafe {
            ffi::sqlite3_sleep(millis);
        }
    }
}
