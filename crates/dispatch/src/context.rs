//! Capabilities injected into the dispatcher
//!
//! These traits let the engine run without knowing how hosts are reached,
//! where log lines go, or how progress is displayed.

use crate::host::Host;
use crate::types::Outcome;
use anyhow::Result;
use log::Level;

/// Runs one operation against one host.
///
/// Called concurrently from worker threads, so implementations must be
/// `Send + Sync`. The returned string is the host's output on success.
///
/// Any closure `Fn(&Host) -> anyhow::Result<String>` is an executor.
pub trait HostExecutor: Send + Sync {
    fn execute(&self, host: &Host) -> Result<String>;
}

impl<F> HostExecutor for F
where
    F: Fn(&Host) -> Result<String> + Send + Sync,
{
    fn execute(&self, host: &Host) -> Result<String> {
        self(host)
    }
}

/// Destination for the dispatcher's completion report
pub trait LogSink: Send + Sync {
    /// Emit one formatted line at the given severity
    fn log(&self, level: Level, message: &str);
}

/// Log target of the completion report sent through [`LogFacade`]
pub const REPORT_TARGET: &str = "dispatch::report";

/// Sink that forwards to the `log` facade under [`REPORT_TARGET`]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: REPORT_TARGET, level, "{message}");
    }
}

/// Sink that discards everything
pub struct NoLog;

impl LogSink for NoLog {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Progress observer for a dispatch.
///
/// Host callbacks fire on worker threads, possibly at the same time.
pub trait DispatchProgress: Send + Sync {
    /// Called once before any host starts
    fn on_dispatch_start(&self, total: usize);

    /// Called when a host's operation starts
    fn on_host_start(&self, host: &Host);

    /// Called when a host's outcome has been recorded, including cancellations
    fn on_host_complete(&self, host: &Host, outcome: &Outcome);

    /// Called once after every host has an outcome
    fn on_dispatch_complete(&self);
}

/// No-op progress observer
pub struct NoProgress;

impl DispatchProgress for NoProgress {
    fn on_dispatch_start(&self, _total: usize) {}
    fn on_host_start(&self, _host: &Host) {}
    fn on_host_complete(&self, _host: &Host, _outcome: &Outcome) {}
    fn on_dispatch_complete(&self) {}
}
