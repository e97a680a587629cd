//! BackUP - Command-line interface for online SQLite backups.
//!
//! Copies a live database with the backup engine, drawing progress on
//! stderr. Any failure is logged with its full cause chain and the process
//! exits non-zero.

use anyhow::{bail, Context};
use backup_engine::{
    run_backup, BackupOptions, BackupReport, Progress, ProgressCallback, Status,
    DEFAULT_STEP_PAGES,
};
use clap::Parser;
use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// BackUP - Online backup of a live SQLite database
#[derive(Parser, Debug)]
#[command(name = "sqlite-backup")]
#[command(version = "0.1.0")]
#[command(about = "Copy a live SQLite database page by page with the online backup API")]
struct Args {
    /// Database to back up
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Backup file to write (created if absent)
    #[arg(value_name = "DESTINATION")]
    destination: PathBuf,

    /// Pages copied per step
    #[arg(value_name = "PAGES", default_value_t = DEFAULT_STEP_PAGES, value_parser = clap::value_parser!(u32).range(1..))]
    pages: u32,

    /// Give up after this many steps
    #[arg(long, value_name = "N", env = "SQLITE_BACKUP_MAX_STEPS")]
    max_steps: Option<u64>,

    /// Delay after each step that left work outstanding, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 250, env = "SQLITE_BACKUP_BACKOFF_MS")]
    backoff_ms: u64,

    /// Run an integrity check on the finished backup
    #[arg(long)]
    verify: bool,

    /// Print the backup report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// CLI implementation of ProgressCallback for displaying backup progress
struct CliProgress {
    verbose: bool,
    last_progress_update: Cell<Option<Instant>>,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            last_progress_update: Cell::new(None),
        }
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!(
            "[{}{}] {}%",
            "=".repeat(filled),
            " ".repeat(empty),
            percent
        )
    }
}

impl ProgressCallback for CliProgress {
    fn on_backup_started(&self, progress: &Progress) {
        eprintln!("Starting backup...");
        eprintln!("  Source: {}", progress.source_path.display());
        eprintln!("  Destination: {}", progress.destination_path.display());
        eprintln!();
    }

    fn on_step(&self, progress: &Progress, status: Status) {
        if self.verbose {
            eprintln!(
                "[{:4}] {}: {}/{} pages remaining",
                progress.steps,
                status,
                progress.remaining_pages.unwrap_or(0),
                progress.total_pages.unwrap_or(0)
            );
            return;
        }

        // Throttle progress updates to avoid spam (max once per 200ms)
        let now = Instant::now();
        if let Some(last) = self.last_progress_update.get() {
            if !progress.finished && now.duration_since(last).as_millis() < 200 {
                return;
            }
        }
        self.last_progress_update.set(Some(now));

        eprint!(
            "\rProgress: {} | {}/{} pages",
            Self::print_progress_bar(progress.percent()),
            progress.copied_pages(),
            progress.total_pages.unwrap_or(0)
        );
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }

    fn on_backup_completed(&self, report: &BackupReport) {
        eprintln!();
        eprintln!("Backup complete!");
        eprintln!(
            "Summary: {} pages in {} steps",
            report.total_pages, report.steps
        );
        if report.verified {
            eprintln!("Verification: integrity check passed");
        }
        if report.destination_preexisted {
            eprintln!("Note: overwrote existing {}", report.destination_path.display());
        }
        let elapsed = report.elapsed().to_std().unwrap_or_default();
        eprintln!("Elapsed: {}", Self::format_duration(elapsed));
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse arguments, run the backup, and map the outcome to an exit code
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(err) => {
            error!("backup failed: {:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> anyhow::Result<()> {
    // Validate destination directory path is valid
    if let Some(parent) = args.destination.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            bail!(
                "Parent of destination does not exist: {}",
                parent.display()
            );
        }
    }

    // Backing a file up onto itself would wait on its own lock forever
    if let (Ok(src), Ok(dst)) = (
        fs::canonicalize(&args.source),
        fs::canonicalize(&args.destination),
    ) {
        if src == dst {
            bail!("Source and destination are the same file: {}", src.display());
        }
    }

    let options = BackupOptions::default()
        .with_step_pages(args.pages)
        .with_backoff(Duration::from_millis(args.backoff_ms))
        .with_max_steps(args.max_steps)
        .with_verify(args.verify);

    let progress = CliProgress::new(args.verbose);

    let report = run_backup(&args.source, &args.destination, options, Some(&progress))
        .with_context(|| {
            format!(
                "Failed to back up {} to {}",
                args.source.display(),
                args.destination.display()
            )
        })?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", json);
    }

    Ok(())
}
