//! # Dispatch
//!
//! Cluster command dispatch for database admin tooling.
//!
//! Fans one operation out to every host of a cluster with bounded
//! parallelism, records exactly one outcome per host, and reduces the
//! outcomes into a single pass/fail verdict with a combined diagnostic.
//!
//! ## Core Concepts
//!
//! - **Host / HostSet**: cluster members with unique identifiers
//! - **HostExecutor**: the injected "run this on that host" capability
//! - **Policy**: continue-on-error vs fail-fast, and the concurrency bound
//! - **Dispatcher**: runs the executor on a fixed pool of workers
//! - **DispatchResult**: one [`Outcome`] per host
//! - **Reducer**: verdict plus a [`CodedError`] listing every failing host
//!
//! ## Example
//!
//! ```no_run
//! use dispatch::{Dispatcher, Host, HostSet, Policy, reduce};
//!
//! let hosts = HostSet::from_hostnames(["sdw1", "sdw2", "sdw3"])?;
//! let ping = |host: &Host| -> anyhow::Result<String> {
//!     Ok(format!("{} is up", host.hostname))
//! };
//!
//! let result = Dispatcher::new(Policy::fail_fast(8)).run(&hosts, &ping)?;
//! let verdict = reduce(&result, 1u32);
//! if let Some(err) = verdict.error {
//!     eprintln!("{err}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`HostExecutor`]: runs the operation on one host
//! - [`LogSink`]: receives the per-host completion report
//! - [`DispatchProgress`]: observes hosts starting and finishing
//!
//! The engine knows nothing about SSH, local shells or database
//! connections; those live behind [`HostExecutor`].

pub mod cluster;
pub mod coded;
pub mod collector;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod reducer;
pub mod retry;
pub mod types;

// Re-export main types at crate root
pub use cluster::{Cluster, Scope, Target};
pub use coded::{CodedError, ErrorCode};
pub use collector::ResultCollector;
pub use context::{
    DispatchProgress, HostExecutor, LogFacade, LogSink, NoLog, NoProgress, REPORT_TARGET,
};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use host::{Host, HostId, HostSet, Role};
pub use reducer::{Reduction, classify, reduce, render_failures, report};
pub use retry::{RetryConfig, Retrying};
pub use types::{DispatchResult, DispatchStatus, DispatchSummary, Outcome, Policy};
