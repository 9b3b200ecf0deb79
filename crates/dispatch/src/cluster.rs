//! Cluster layout and host selection
//!
//! Admin utilities either work per segment instance (several may share a
//! machine) or per machine. [`Scope`] picks which, and whether the
//! coordinator and mirrors take part.

use crate::error::Result;
use crate::host::{Host, HostSet, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What one dispatch slot corresponds to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// One execution per segment instance
    #[default]
    Segments,
    /// One execution per distinct hostname
    Hosts,
}

/// Which cluster members a dispatch covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
    pub target: Target,
    pub include_coordinator: bool,
    pub include_mirrors: bool,
}

impl Scope {
    /// Every primary segment instance
    pub fn segments() -> Self {
        Self::default()
    }

    /// Every distinct machine hosting a primary
    pub fn hosts() -> Self {
        Self {
            target: Target::Hosts,
            ..Self::default()
        }
    }

    pub fn with_coordinator(mut self) -> Self {
        self.include_coordinator = true;
        self
    }

    pub fn with_mirrors(mut self) -> Self {
        self.include_mirrors = true;
        self
    }
}

/// The full membership of a cluster
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    pub coordinator: Option<Host>,
    pub segments: Vec<Host>,
}

impl Cluster {
    pub fn new(coordinator: Option<Host>, segments: Vec<Host>) -> Self {
        Self {
            coordinator,
            segments,
        }
    }

    /// Content ids of primary segments, sorted
    pub fn content_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .segments
            .iter()
            .filter(|s| s.role == Role::Primary)
            .filter_map(|s| s.content_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Select the hosts covered by `scope`.
    ///
    /// Coordinator first, then segments in configuration order. In
    /// [`Target::Hosts`] mode the first member seen on a machine stands in for
    /// it, re-identified by bare hostname.
    pub fn select(&self, scope: Scope) -> Result<HostSet> {
        let members = self
            .coordinator
            .iter()
            .filter(|_| scope.include_coordinator)
            .chain(
                self.segments
                    .iter()
                    .filter(|s| s.role != Role::Mirror || scope.include_mirrors),
            );

        let hosts = match scope.target {
            Target::Segments => members.cloned().collect(),
            Target::Hosts => {
                let mut seen = HashSet::new();
                members
                    .filter(|h| seen.insert(h.hostname.as_str()))
                    .map(|h| h.clone().with_id(h.hostname.as_str()))
                    .collect()
            }
        };

        HostSet::new(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Cluster {
        Cluster::new(
            Some(Host::coordinator("cdw").with_port(5432)),
            vec![
                Host::segment(0, Role::Primary, "sdw1", 6000),
                Host::segment(1, Role::Primary, "sdw1", 6001),
                Host::segment(2, Role::Primary, "sdw2", 6000),
                Host::segment(0, Role::Mirror, "sdw2", 7000),
                Host::segment(1, Role::Mirror, "sdw3", 7001),
            ],
        )
    }

    fn ids(set: &HostSet) -> Vec<&str> {
        set.ids().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_select_primary_segments() {
        let set = cluster().select(Scope::segments()).unwrap();
        assert_eq!(ids(&set), vec!["sdw1:6000", "sdw1:6001", "sdw2:6000"]);
    }

    #[test]
    fn test_select_with_coordinator_and_mirrors() {
        let set = cluster()
            .select(Scope::segments().with_coordinator().with_mirrors())
            .unwrap();
        assert_eq!(set.len(), 6);
        assert_eq!(ids(&set)[0], "cdw:5432");
    }

    #[test]
    fn test_select_hosts_dedupes_machines() {
        let set = cluster().select(Scope::hosts()).unwrap();
        assert_eq!(ids(&set), vec!["sdw1", "sdw2"]);

        let set = cluster()
            .select(Scope::hosts().with_coordinator().with_mirrors())
            .unwrap();
        assert_eq!(ids(&set), vec!["cdw", "sdw1", "sdw2", "sdw3"]);
    }

    #[test]
    fn test_content_ids() {
        assert_eq!(cluster().content_ids(), vec![0, 1, 2]);
    }
}
