//! Filesystem operations module.
//!
//! The engine itself creates and writes the destination file. This module
//! only answers whether a destination already exists and removes one that a
//! failed session created.

use std::fs;
use std::io;
use std::path::Path;

/// Check whether anything exists at `path`.
///
/// Dangling symlinks count as existing: the engine would follow them on
/// open, and they must not be deleted as if the session had created them.
pub fn destination_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove a destination file left behind by a failed backup.
///
/// # Returns
/// `true` if a file was removed, `false` if there was nothing to remove
///
/// # Errors
/// Any removal error other than `NotFound`
pub fn remove_incomplete_destination(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
