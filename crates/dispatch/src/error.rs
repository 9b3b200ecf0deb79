//! Internal fault types for the dispatch engine.
//!
//! None of these represent a host failing. Host failures are recorded as
//! [`Outcome`](crate::Outcome)s; the variants here mean the caller passed an
//! invalid request or the engine's own bookkeeping broke.

use crate::host::HostId;
use thiserror::Error;

/// Errors raised by the dispatch engine itself.
#[derive(Debug, Error)]
pub enum Error {
    /// Policy asked for zero concurrent executions
    #[error("max concurrency must be at least 1")]
    InvalidConcurrency,

    /// Two hosts in one dispatch share an identifier
    #[error("duplicate host identifier: {0}")]
    DuplicateHost(HostId),

    /// A host's outcome was recorded twice (the host was scheduled twice)
    #[error("outcome for host {0} recorded more than once")]
    DuplicateRecord(HostId),

    /// An outcome was recorded for a host that is not part of the dispatch
    #[error("outcome recorded for unknown host: {0}")]
    UnknownHost(HostId),

    /// The collector was drained before every host had an outcome
    #[error("result collection incomplete: expected {expected} hosts, recorded {recorded}")]
    Incomplete {
        /// Number of hosts in the dispatch
        expected: usize,
        /// Number of outcomes actually recorded
        recorded: usize,
    },

    /// The worker pool could not be started
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Whether this error means the engine's bookkeeping is broken, as opposed
    /// to the caller supplying an invalid request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRecord(_) | Self::UnknownHost(_) | Self::Incomplete { .. }
        )
    }
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_classification() {
        assert!(Error::DuplicateRecord(HostId::new("sdw1")).is_internal());
        assert!(
            Error::Incomplete {
                expected: 3,
                recorded: 2
            }
            .is_internal()
        );
        assert!(!Error::InvalidConcurrency.is_internal());
        assert!(!Error::DuplicateHost(HostId::new("sdw1")).is_internal());
    }

    #[test]
    fn test_messages_name_the_host() {
        let err = Error::DuplicateRecord(HostId::new("sdw3:6001"));
        assert_eq!(
            err.to_string(),
            "outcome for host sdw3:6001 recorded more than once"
        );
    }
}
