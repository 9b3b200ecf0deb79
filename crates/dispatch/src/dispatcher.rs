//! Dispatch engine - runs one operation on every host with a bounded worker pool

use crate::collector::ResultCollector;
use crate::context::{DispatchProgress, HostExecutor, LogFacade, LogSink, NoProgress};
use crate::error::{Error, Result};
use crate::host::{Host, HostSet};
use crate::reducer;
use crate::types::{DispatchResult, Outcome, Policy};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Runs an operation across a host set.
///
/// The dispatcher keeps no state between runs: every call to [`run`](Self::run)
/// builds its own worker pool, queue, cancellation token and collector.
pub struct Dispatcher {
    policy: Policy,
    sink: Arc<dyn LogSink>,
    progress: Arc<dyn DispatchProgress>,
}

impl Dispatcher {
    /// Create a dispatcher reporting through the `log` facade
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            sink: Arc::new(LogFacade),
            progress: Arc::new(NoProgress),
        }
    }

    /// Replace the sink that receives the completion report
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Attach a progress observer
    pub fn with_progress(mut self, progress: Arc<dyn DispatchProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Run `op` once against every host in `hosts`.
    ///
    /// At most `policy.max_concurrency` executions are in flight at any time.
    /// Under fail-fast, the first failure stops new hosts from starting;
    /// executions already running finish and are recorded, and every host
    /// not yet started is recorded as [`Outcome::Cancelled`].
    ///
    /// Host failures never make this return `Err`. Errors are reserved for an
    /// invalid policy, a worker pool that cannot start, or broken bookkeeping.
    pub fn run<E>(&self, hosts: &HostSet, op: &E) -> Result<DispatchResult>
    where
        E: HostExecutor + ?Sized,
    {
        if self.policy.max_concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }
        if hosts.is_empty() {
            log::debug!("dispatch with no hosts, nothing to do");
            return Ok(DispatchResult::default());
        }

        let workers = self.policy.max_concurrency.min(hosts.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dispatch-{i}"))
            .build()?;

        log::debug!(
            "dispatching to {} hosts with {} workers (continue_on_error={})",
            hosts.len(),
            workers,
            self.policy.continue_on_error
        );

        let run = Run {
            policy: self.policy,
            progress: self.progress.as_ref(),
            queue: WorkQueue::new(hosts.as_slice()),
            cancel: CancelToken::new(),
            collector: ResultCollector::new(hosts.ids()),
            fault: Mutex::new(None),
        };

        self.progress.on_dispatch_start(hosts.len());
        pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| run.work(op));
            }
        });

        self.complete(run)
    }

    /// Close out a run. Progress is told the dispatch is over even when the
    /// run turns out to be faulty.
    fn complete(&self, run: Run<'_>) -> Result<DispatchResult> {
        let finished = run.finish();
        self.progress.on_dispatch_complete();
        let result = finished?;
        reducer::report(&result, self.sink.as_ref());
        Ok(result)
    }
}

/// State shared by the workers of one run
struct Run<'a> {
    policy: Policy,
    progress: &'a dyn DispatchProgress,
    queue: WorkQueue<'a>,
    cancel: CancelToken,
    collector: ResultCollector,
    fault: Mutex<Option<Error>>,
}

impl Run<'_> {
    /// Worker loop: pull hosts until the queue is empty.
    ///
    /// Cancelled runs keep draining the queue so that every remaining host
    /// gets its `Cancelled` outcome.
    fn work<E>(&self, op: &E)
    where
        E: HostExecutor + ?Sized,
    {
        while let Some(host) = self.queue.next() {
            let outcome = if self.cancel.is_cancelled() {
                Outcome::Cancelled
            } else {
                self.progress.on_host_start(host);
                let outcome = execute_host(op, host);
                if outcome.is_failure() && !self.policy.continue_on_error && self.cancel.cancel()
                {
                    log::debug!("host {} failed, no new hosts will be started", host.id);
                }
                outcome
            };

            self.progress.on_host_complete(host, &outcome);
            if let Err(e) = self.collector.record(&host.id, outcome) {
                log::error!("dispatch bookkeeping fault: {e}");
                self.fault
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert(e);
            }
        }
    }

    fn finish(self) -> Result<DispatchResult> {
        if let Some(fault) = self.fault.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(fault);
        }
        Ok(DispatchResult::from_outcomes(self.collector.snapshot()?))
    }
}

/// Hands out each host exactly once, in input order
struct WorkQueue<'a> {
    hosts: &'a [Host],
    next: AtomicUsize,
}

impl<'a> WorkQueue<'a> {
    fn new(hosts: &'a [Host]) -> Self {
        Self {
            hosts,
            next: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Option<&'a Host> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.hosts.get(index)
    }
}

/// Broadcast "stop accepting new work" signal.
///
/// Checked by workers before each host starts; never interrupts an execution
/// already in flight.
#[derive(Debug, Default)]
pub(crate) struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Returns `true` for the call that fired it.
    pub(crate) fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Run the operation for one host, turning errors and panics into outcomes
fn execute_host<E>(op: &E, host: &Host) -> Outcome
where
    E: HostExecutor + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| op.execute(host))) {
        Ok(Ok(output)) => Outcome::Success { output },
        Ok(Err(e)) => Outcome::Failed {
            error: format!("{e:#}"),
        },
        Err(payload) => Outcome::Failed {
            error: format!("operation panicked: {}", panic_message(payload.as_ref())),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return s;
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.as_str();
    }
    "unknown panic"
}
