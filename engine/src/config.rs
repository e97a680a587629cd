//! Session configuration.

use std::time::Duration;

/// Pages copied per step when the caller does not choose a batch size.
pub const DEFAULT_STEP_PAGES: u32 = 5;

/// Delay after a step that left work outstanding or hit contention.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Tuning knobs for a backup session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOptions {
    /// Pages copied per `step` call made by `run`. Zero is treated as one.
    pub step_pages: u32,

    /// Sleep applied after `Ok`, `Busy` and `Locked` step results
    pub backoff: Duration,

    /// Upper bound on step calls made by `run`; `None` retries forever
    pub max_steps: Option<u64>,

    /// Run `PRAGMA integrity_check` on the destination after a successful copy
    pub verify: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        BackupOptions {
            step_pages: DEFAULT_STEP_PAGES,
            backoff: DEFAULT_BACKOFF,
            max_steps: None,
            verify: false,
        }
    }
}

impl BackupOptions {
    pub fn with_step_pages(mut self, pages: u32) -> Self {
        self.step_pages = pages;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}
