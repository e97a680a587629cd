//! Post-copy verification.
//!
//! A finished backup is not byte-identical to its source: SQLite bumps the
//! schema cookie in the destination header when a copy completes. Instead of
//! hashing files, verification asks the engine to check the destination's
//! structure.

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::debug;

use crate::error::BackupError;

/// Run `PRAGMA integrity_check` against the database at `path`.
///
/// # Errors
/// `VerificationFailed` with the reported problems if the check does not
/// return a single `ok` row; `Sqlite` if the file cannot be opened or queried.
pub fn integrity_check(path: &Path) -> Result<(), BackupError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
    let problems = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if problems.len() == 1 && problems[0] == "ok" {
        debug!(path = %path.display(), "integrity check passed");
        return Ok(());
    }

    Err(BackupError::VerificationFailed {
        path: path.to_path_buf(),
        details: problems.join("; "),
    })
}
