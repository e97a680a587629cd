//! # BackUP Engine - Online SQLite Backup Library
//!
//! A headless engine that copies a live SQLite database into a destination
//! file while other processes keep reading and writing the source.
//! Designed as the foundation for multiple front ends (CLI, automation).
//!
//! ## Overview
//!
//! The engine drives SQLite's incremental backup API through a step-wise,
//! observable session. It features:
//! - Page-batch copying with backoff when the source is busy or locked
//! - Progress accounting and callbacks (decoupled from UI technology)
//! - Guaranteed teardown: every handle is released exactly once
//! - Removal of a half-written destination that the session created
//! - Optional integrity check of the finished copy
//!
//! ## Basic Usage
//!
//! ```no_run
//! use backup_engine::BackupSession;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = BackupSession::new("app.db", "app-backup.db");
//!
//! // Open both files and start the copy
//! session.init()?;
//!
//! // Copy five pages at a time until the engine reports completion
//! while !session.is_finished() {
//!     session.step(5)?;
//! }
//!
//! // Release everything; fails if the destination recorded an error
//! session.finish()?;
//! # Ok(())
//! # }
//! ```
//!
//! `BackupSession::run` performs the same loop, and also deletes a newly
//! created destination if anything fails.
//!
//! ## Modules
//!
//! - **session**: BackupSession lifecycle (init, step, finish, run)
//! - **api**: Engine capability trait the session drives
//! - **native**: The capability trait over the bundled SQLite library
//! - **model**: Status codes, step outcomes, progress, reports
//! - **config**: Session options and defaults
//! - **error**: Error types
//! - **fs_ops**: Destination existence checks and cleanup
//! - **progress**: Progress callback trait
//! - **verify**: Post-copy integrity check

pub mod api;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod model;
pub mod native;
pub mod progress;
pub mod session;
pub mod verify;

#[cfg(test)]
mod scripted;

// Re-export main types and functions
pub use api::{BackupApi, OpenMode, MAIN_DATABASE};
pub use config::{BackupOptions, DEFAULT_BACKOFF, DEFAULT_STEP_PAGES};
pub use error::BackupError;
pub use model::{BackupReport, Progress, Status, StepOutcome};
pub use native::NativeSqlite;
pub use progress::ProgressCallback;
pub use session::{run_backup, BackupSession};
