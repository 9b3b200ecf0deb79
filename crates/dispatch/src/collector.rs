//! Concurrent accumulation of per-host outcomes

use crate::error::{Error, Result};
use crate::host::HostId;
use crate::types::Outcome;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Thread-safe map from host id to outcome, written exactly once per host.
///
/// Each write is one critical section. The collector is consumed by
/// [`snapshot`](Self::snapshot), so the map can only be read after every
/// worker holding a reference to it is gone.
pub struct ResultCollector {
    expected: HashSet<HostId>,
    outcomes: Mutex<HashMap<HostId, Outcome>>,
}

impl ResultCollector {
    /// Create a collector expecting one outcome for each of `ids`
    pub fn new<'a>(ids: impl IntoIterator<Item = &'a HostId>) -> Self {
        let expected: HashSet<HostId> = ids.into_iter().cloned().collect();
        let capacity = expected.len();
        Self {
            expected,
            outcomes: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Record a host's outcome.
    ///
    /// Recording the same host twice means the host was scheduled twice and
    /// is reported as [`Error::DuplicateRecord`]; the first outcome is kept.
    pub fn record(&self, id: &HostId, outcome: Outcome) -> Result<()> {
        if !self.expected.contains(id) {
            return Err(Error::UnknownHost(id.clone()));
        }

        // A panicking writer cannot leave the map half-updated: insert is the
        // only mutation and it happens after the duplicate check.
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        if outcomes.contains_key(id) {
            return Err(Error::DuplicateRecord(id.clone()));
        }
        outcomes.insert(id.clone(), outcome);
        Ok(())
    }

    /// Number of outcomes recorded so far
    pub fn recorded(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drain the collector into a complete, sorted mapping.
    ///
    /// Fails with [`Error::Incomplete`] if any expected host has no outcome.
    pub fn snapshot(self) -> Result<BTreeMap<HostId, Outcome>> {
        let outcomes = self
            .outcomes
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        if outcomes.len() != self.expected.len() {
            return Err(Error::Incomplete {
                expected: self.expected.len(),
                recorded: outcomes.len(),
            });
        }

        Ok(outcomes.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ids(names: &[&str]) -> Vec<HostId> {
        names.iter().map(|n| HostId::new(*n)).collect()
    }

    #[test]
    fn test_record_and_snapshot() {
        let hosts = ids(&["h2", "h1"]);
        let collector = ResultCollector::new(&hosts);
        collector.record(&hosts[0], Outcome::success("b")).unwrap();
        collector.record(&hosts[1], Outcome::success("a")).unwrap();
        assert_eq!(collector.recorded(), 2);

        let snapshot = collector.snapshot().unwrap();
        let keys: Vec<&str> = snapshot.keys().map(HostId::as_str).collect();
        assert_eq!(keys, vec!["h1", "h2"]);
    }

    #[test]
    fn test_double_record_fails_loudly() {
        let hosts = ids(&["h1"]);
        let collector = ResultCollector::new(&hosts);
        collector.record(&hosts[0], Outcome::success("first")).unwrap();

        let err = collector
            .record(&hosts[0], Outcome::failed("second"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRecord(_)));

        let snapshot = collector.snapshot().unwrap();
        assert_eq!(snapshot[&hosts[0]], Outcome::success("first"));
    }

    #[test]
    fn test_unknown_host_rejected() {
        let collector = ResultCollector::new(&ids(&["h1"]));
        let err = collector
            .record(&HostId::new("h9"), Outcome::Cancelled)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownHost(_)));
    }

    #[test]
    fn test_incomplete_snapshot() {
        let hosts = ids(&["h1", "h2", "h3"]);
        let collector = ResultCollector::new(&hosts);
        collector.record(&hosts[0], Outcome::Cancelled).unwrap();

        let err = collector.snapshot().unwrap_err();
        assert!(matches!(
            err,
            Error::Incomplete {
                expected: 3,
                recorded: 1
            }
        ));
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let hosts: Vec<HostId> = (0..64).map(|i| HostId::new(format!("sdw{i}"))).collect();
        let collector = ResultCollector::new(&hosts);

        thread::scope(|s| {
            for chunk in hosts.chunks(8) {
                let collector = &collector;
                s.spawn(move || {
                    for id in chunk {
                        collector.record(id, Outcome::success(id.as_str())).unwrap();
                    }
                });
            }
        });

        let snapshot = collector.snapshot().unwrap();
        assert_eq!(snapshot.len(), 64);
        assert!(snapshot.values().all(Outcome::is_success));
    }
}
