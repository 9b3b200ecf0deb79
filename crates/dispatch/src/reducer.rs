//! Reduction of per-host outcomes into one verdict

use crate::coded::{CodedError, ErrorCode};
use crate::context::LogSink;
use crate::host::HostId;
use crate::types::{DispatchResult, DispatchStatus};
use log::Level;

/// Pass/fail verdict for a dispatch
#[derive(Debug)]
pub struct Reduction {
    /// True iff every host succeeded
    pub ok: bool,
    pub status: DispatchStatus,
    /// Combined diagnostic naming every failing host, present iff `!ok`
    pub error: Option<CodedError>,
}

impl Reduction {
    /// Convert into a `Result`, surfacing the aggregate error
    pub fn into_result(self) -> Result<(), CodedError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Terminal status of a finished dispatch
pub fn classify(result: &DispatchResult) -> DispatchStatus {
    let summary = result.summary();
    if summary.cancelled > 0 {
        DispatchStatus::Cancelled
    } else if summary.failed == 0 {
        DispatchStatus::AllSucceeded
    } else if summary.succeeded == 0 {
        DispatchStatus::TotalFailure
    } else {
        DispatchStatus::PartialFailure
    }
}

/// Reduce a dispatch to a verdict.
///
/// Pure: reducing the same result twice gives the same verdict and message.
/// `code` is attached to the aggregate error unchanged.
pub fn reduce(result: &DispatchResult, code: impl Into<ErrorCode>) -> Reduction {
    let status = classify(result);
    let error = render_failures(result).map(|message| CodedError::new(code, message));
    Reduction {
        ok: error.is_none(),
        status,
        error,
    }
}

/// Render every failing host into one message, or `None` if all succeeded.
///
/// Hosts whose operation ran and failed are listed one per line as
/// `<id>: <error>`, sorted by host id. Hosts that never ran are listed
/// together on a final line.
pub fn render_failures(result: &DispatchResult) -> Option<String> {
    let summary = result.summary();
    if summary.is_success() {
        return None;
    }

    let mut message = format!(
        "{} of {} hosts failed",
        summary.failures(),
        summary.total()
    );

    for (id, error) in result.failed() {
        message.push_str(&format!("\n  {id}: {}", indent_continuation(error)));
    }

    let cancelled: Vec<&str> = result.cancelled().map(HostId::as_str).collect();
    if !cancelled.is_empty() {
        message.push_str(&format!(
            "\n  not attempted (dispatch cancelled): {}",
            cancelled.join(", ")
        ));
    }

    Some(message)
}

/// Emit one line per failing host, then a summary line
pub fn report(result: &DispatchResult, sink: &dyn LogSink) {
    for (id, error) in result.failed() {
        sink.log(Level::Error, &format!("{id}: {}", first_line(error)));
    }
    for id in result.cancelled() {
        sink.log(Level::Warn, &format!("{id}: not attempted (dispatch cancelled)"));
    }

    let summary = result.summary();
    if summary.is_success() {
        sink.log(
            Level::Info,
            &format!("{} of {} hosts succeeded", summary.succeeded, summary.total()),
        );
    } else {
        sink.log(
            Level::Error,
            &format!("{} of {} hosts failed", summary.failures(), summary.total()),
        );
    }
}

fn indent_continuation(text: &str) -> String {
    text.trim().replace('\n', "\n    ")
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}
