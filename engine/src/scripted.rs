//! Scripted `BackupApi` used by the session tests.
//!
//! Models a source of a fixed number of pages. Each step copies up to the
//! requested page count unless a scripted status is queued, in which case
//! that status is returned and no pages move. Every call is logged so tests
//! can assert on ordering and on what was released.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{BackupApi, OpenMode};
use crate::model::Status;

#[derive(Debug)]
pub struct ScriptedConnection {
    label: &'static str,
}

#[derive(Debug)]
pub struct ScriptedCursor {
    failure: Option<Status>,
}

#[derive(Debug)]
pub struct ScriptedEngine {
    total_pages: Cell<u32>,
    remaining: Cell<u32>,
    script: RefCell<VecDeque<Status>>,
    open_failures: RefCell<HashMap<PathBuf, Status>>,
    refuse_begin: Cell<bool>,
    destination_error: Cell<Option<Status>>,
    calls: RefCell<Vec<String>>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ScriptedEngine {
    pub fn new(total_pages: u32) -> Self {
        ScriptedEngine {
            total_pages: Cell::new(total_pages),
            remaining: Cell::new(total_pages),
            script: RefCell::new(VecDeque::new()),
            open_failures: RefCell::new(HashMap::new()),
            refuse_begin: Cell::new(false),
            destination_error: Cell::new(None),
            calls: RefCell::new(Vec::new()),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    /// Queue statuses returned, in order, by the next steps instead of copying.
    pub fn script(self, statuses: &[Status]) -> Self {
        self.script.borrow_mut().extend(statuses.iter().copied());
        self
    }

    /// Make `open` of `path` report `status` (still handing back a connection).
    pub fn fail_open(self, path: &Path, status: Status) -> Self {
        self.open_failures.borrow_mut().insert(path.to_path_buf(), status);
        self
    }

    pub fn refuse_begin(self) -> Self {
        self.refuse_begin.set(true);
        self
    }

    /// Leave `status` on the destination connection regardless of step results.
    pub fn fail_destination(self, status: Status) -> Self {
        self.destination_error.set(Some(status));
        self
    }

    /// Simulate a concurrent writer adding pages to the source.
    pub fn grow_source(&self, pages: u32) {
        self.total_pages.set(self.total_pages.get() + pages);
        self.remaining.set(self.remaining.get() + pages);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    fn log(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl BackupApi for ScriptedEngine {
    type Connection = ScriptedConnection;
    type Cursor = ScriptedCursor;

    fn open(&self, path: &Path, mode: OpenMode) -> (Status, Option<ScriptedConnection>) {
        let label = match mode {
            OpenMode::ReadOnly => "source",
            OpenMode::ReadWriteCreate => "destination",
        };
        self.log(format!("open({label})"));

        if let Some(status) = self.open_failures.borrow().get(path) {
            return (*status, Some(ScriptedConnection { label }));
        }

        // Like SQLite, opening for write creates the file immediately.
        if mode == OpenMode::ReadWriteCreate
            && OpenOptions::new().create(true).append(true).open(path).is_err()
        {
            return (Status::Other(14), Some(ScriptedConnection { label }));
        }

        (Status::Ok, Some(ScriptedConnection { label }))
    }

    fn backup_begin(
        &self,
        dest: &ScriptedConnection,
        dest_name: &str,
        source: &ScriptedConnection,
        source_name: &str,
    ) -> Option<ScriptedCursor> {
        self.log(format!(
            "begin({}.{dest_name} <- {}.{source_name})",
            dest.label, source.label
        ));
        if self.refuse_begin.get() {
            return None;
        }
        Some(ScriptedCursor { failure: None })
    }

    fn backup_step(&self, cursor: &mut ScriptedCursor, pages: u32) -> Status {
        self.log(format!("step({pages})"));

        if let Some(status) = self.script.borrow_mut().pop_front() {
            if !status.is_transient() && status != Status::Done {
                cursor.failure = Some(status);
            }
            return status;
        }

        let copied = pages.min(self.remaining.get());
        self.remaining.set(self.remaining.get() - copied);
        if self.remaining.get() == 0 {
            Status::Done
        } else {
            Status::Ok
        }
    }

    fn backup_remaining(&self, _cursor: &ScriptedCursor) -> u32 {
        self.remaining.get()
    }

    fn backup_pagecount(&self, _cursor: &ScriptedCursor) -> u32 {
        self.total_pages.get()
    }

    fn backup_finish(&self, cursor: ScriptedCursor) {
        self.log("finish_cursor".to_string());
        if self.destination_error.get().is_none() {
            self.destination_error.set(cursor.failure);
        }
    }

    fn last_error_code(&self, conn: &ScriptedConnection) -> Status {
        self.log(format!("errcode({})", conn.label));
        self.destination_error.get().unwrap_or(Status::Ok)
    }

    fn close(&self, conn: ScriptedConnection) {
        self.log(format!("close({})", conn.label));
    }

    fn sleep(&self, duration: Duration) {
        self.log("sleep".to_string());
        self.sleeps.borrow_mut().push(duration);
    }
}
