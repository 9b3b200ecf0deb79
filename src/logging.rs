//! Logging to the shell and to a dated log file
//!
//! Every run writes two streams with independent verbosity:
//!
//! - the shell (stderr), through `env_logger`, at the `-v`/`-q` level
//! - `<log dir>/gpcluster_<YYYYMMDD>.log`, appended to, at `--log-level`
//!
//! The log directory defaults to `~/gpAdminLogs` and is created if missing.
//! A log file that cannot be opened is fatal.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::paths;

/// Program name used in log file names and line headers
pub const PROGRAM: &str = "gpcluster";

/// Log directory under the home directory when none is given
pub const DEFAULT_LOG_DIR: &str = "gpAdminLogs";

/// Resolve the log directory: an explicit one, or `~/gpAdminLogs`
pub fn log_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(paths::expand(&dir.to_string_lossy()));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DEFAULT_LOG_DIR))
}

/// `gpcluster_20170101.log`
pub fn log_file_name(date: NaiveDate) -> String {
    format!("{PROGRAM}_{}.log", date.format("%Y%m%d"))
}

/// Writes log records at or above its own level to a file
pub struct FileLog {
    path: PathBuf,
    level: LevelFilter,
    header: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl FileLog {
    /// Open today's log file in `dir` for appending, creating both if missing
    pub fn open(dir: &Path, level: LevelFilter) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create log directory {}", dir.display()))?;

        let path = dir.join(log_file_name(Local::now().date_naive()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Could not open log file {}", path.display()))?;

        Ok(Self {
            path,
            level,
            header: header(),
            writer: Mutex::new(Box::new(LineWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    fn write(&self, record: &Record<'_>) {
        let line = format_line(Local::now(), &self.header, record.level(), record.args());
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // A failed log write has nowhere better to be reported
        let _ = writeln!(writer, "{line}");
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}

/// `gpcluster:<user>:<host>:<pid>` identifying this process in the log file
fn header() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{PROGRAM}:{user}:{host}:{:06}", std::process::id())
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// `20170101:01:01:01 gpcluster:gpadmin:cdw:000042-[INFO]:-message`
fn format_line(
    now: DateTime<Local>,
    header: &str,
    level: Level,
    message: &std::fmt::Arguments<'_>,
) -> String {
    format!(
        "{} {header}-[{}]:-{message}",
        now.format("%Y%m%d:%H:%M:%S"),
        level_name(level)
    )
}

/// Sends each record to the shell logger and to the log file, each applying
/// its own level
pub struct TeeLogger {
    shell: env_logger::Logger,
    file: Option<FileLog>,
}

impl TeeLogger {
    pub fn new(shell: env_logger::Logger, file: Option<FileLog>) -> Self {
        Self { shell, file }
    }

    /// Most verbose level either destination wants
    pub fn max_level(&self) -> LevelFilter {
        let file = self.file.as_ref().map_or(LevelFilter::Off, FileLog::level);
        self.shell.filter().max(file)
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.shell.enabled(metadata)
            || self
                .file
                .as_ref()
                .is_some_and(|file| file.enabled(metadata.level()))
    }

    fn log(&self, record: &Record<'_>) {
        if self.shell.matches(record) {
            self.shell.log(record);
        }
        if let Some(file) = &self.file
            && file.enabled(record.level())
        {
            file.write(record);
        }
    }

    fn flush(&self) {
        self.shell.flush();
        if let Some(file) = &self.file {
            file.flush();
        }
    }
}

/// Shell logger at `level`. The dispatch completion report only reaches the
/// shell when `report` is set, since commands print their own results.
pub fn shell_logger(level: LevelFilter, report: bool) -> env_logger::Logger {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if !report {
        builder.filter_module(dispatch::REPORT_TARGET, LevelFilter::Off);
    }
    builder.build()
}

/// Install `logger` as the process-wide logger
pub fn install(logger: TeeLogger) -> Result<()> {
    log::set_max_level(logger.max_level());
    log::set_boxed_logger(Box::new(logger)).context("Logger already initialized")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
