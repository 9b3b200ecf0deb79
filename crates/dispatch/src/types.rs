//! Core types for dispatch results and policy

use crate::host::HostId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of running an operation against one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Operation ran and succeeded
    Success { output: String },
    /// Operation ran and failed
    Failed { error: String },
    /// Operation never ran because the dispatch was cancelled first.
    ///
    /// Counts as a failure, but is kept distinct so operators can tell a
    /// step that never ran from one that ran and failed.
    Cancelled,
}

impl Outcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success {
            output: output.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Check if the outcome represents success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Check if the outcome is a failure of any kind (including cancellation)
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Output of a successful run
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Success { output } => Some(output),
            _ => None,
        }
    }

    /// Error message of a run that failed (not of a cancelled one)
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Lifecycle of one dispatch.
///
/// `Pending -> Running -> {AllSucceeded, PartialFailure, TotalFailure, Cancelled}`.
/// There is no resume state; a new dispatch starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Pending,
    Running,
    AllSucceeded,
    PartialFailure,
    TotalFailure,
    /// Fail-fast stopped issuing work; at least one host failed and at least
    /// one was never attempted.
    Cancelled,
}

impl DispatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::AllSucceeded)
    }
}

/// Per-host outcomes of one dispatch.
///
/// Holds exactly one outcome per host that was passed in. Created fresh per
/// dispatch and owned by the caller afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    outcomes: BTreeMap<HostId, Outcome>,
}

impl DispatchResult {
    pub(crate) fn from_outcomes(outcomes: BTreeMap<HostId, Outcome>) -> Self {
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, id: &HostId) -> Option<&Outcome> {
        self.outcomes.get(id)
    }

    /// Outcomes sorted by host id
    pub fn iter(&self) -> impl Iterator<Item = (&HostId, &Outcome)> {
        self.outcomes.iter()
    }

    pub fn outcomes(&self) -> &BTreeMap<HostId, Outcome> {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> BTreeMap<HostId, Outcome> {
        self.outcomes
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &HostId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_success())
            .map(|(id, _)| id)
    }

    /// Hosts whose operation ran and failed
    pub fn failed(&self) -> impl Iterator<Item = (&HostId, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(id, o)| o.error().map(|e| (id, e)))
    }

    pub fn cancelled(&self) -> impl Iterator<Item = &HostId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_cancelled())
            .map(|(id, _)| id)
    }

    pub fn summary(&self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for outcome in self.outcomes.values() {
            summary.add_outcome(outcome);
        }
        summary
    }
}

/// Counts of outcomes by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    /// Failures of any kind, cancellations included
    pub fn failures(&self) -> usize {
        self.failed + self.cancelled
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success { .. } => self.succeeded += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Cancelled => self.cancelled += 1,
        }
    }
}

/// Failure policy and concurrency bound for a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Keep issuing work after a host fails
    pub continue_on_error: bool,
    /// Maximum number of executions in flight at once
    pub max_concurrency: usize,
}

impl Policy {
    /// Attempt every host regardless of failures
    pub fn continue_on_error(max_concurrency: usize) -> Self {
        Self {
            continue_on_error: true,
            max_concurrency,
        }
    }

    /// Stop issuing new work after the first failure
    pub fn fail_fast(max_concurrency: usize) -> Self {
        Self {
            continue_on_error: false,
            max_concurrency,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::continue_on_error(16)
    }
}
