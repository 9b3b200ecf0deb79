//! Host identity and host sets

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable identifier of a host within one dispatch.
///
/// Ordering is plain string ordering; reductions sort failing hosts by it so
/// diagnostics are reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for HostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Role a host plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coordinator,
    Primary,
    Mirror,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Primary => "primary",
            Self::Mirror => "mirror",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressable cluster member.
///
/// The engine only reads hosts; it never changes one mid-dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub hostname: String,
    pub port: Option<u16>,
    pub role: Role,
    /// Segment content id (`-1` for the coordinator)
    pub content_id: Option<i32>,
    pub data_dir: Option<String>,
}

impl Host {
    /// Create a primary-role host identified by its hostname
    pub fn new(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            id: HostId::new(hostname.clone()),
            hostname,
            port: None,
            role: Role::Primary,
            content_id: None,
            data_dir: None,
        }
    }

    /// Create the coordinator host
    pub fn coordinator(hostname: impl Into<String>) -> Self {
        Self::new(hostname).with_role(Role::Coordinator).with_content_id(-1)
    }

    /// Create a segment instance, identified by `hostname:port`
    pub fn segment(content_id: i32, role: Role, hostname: impl Into<String>, port: u16) -> Self {
        Self::new(hostname)
            .with_role(role)
            .with_port(port)
            .with_content_id(content_id)
    }

    /// Override the identifier
    pub fn with_id(mut self, id: impl Into<HostId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the port; the identifier becomes `hostname:port`
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self.id = HostId::new(format!("{}:{}", self.hostname, port));
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_content_id(mut self, content_id: i32) -> Self {
        self.content_id = Some(content_id);
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }
}

/// A set of hosts with unique identifiers, kept in insertion order.
///
/// Insertion order is the order workers pull hosts in; it carries no
/// priority and callers must not depend on completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSet {
    hosts: Vec<Host>,
}

impl HostSet {
    /// Build a set, rejecting duplicate identifiers
    pub fn new(hosts: Vec<Host>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(hosts.len());
        for host in &hosts {
            if !seen.insert(&host.id) {
                return Err(Error::DuplicateHost(host.id.clone()));
            }
        }
        Ok(Self { hosts })
    }

    /// Build a set from bare hostnames
    pub fn from_hostnames<I, S>(hostnames: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(hostnames.into_iter().map(Host::new).collect())
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Host> {
        self.hosts.iter()
    }

    pub fn as_slice(&self) -> &[Host] {
        &self.hosts
    }

    pub fn ids(&self) -> impl Iterator<Item = &HostId> {
        self.hosts.iter().map(|h| &h.id)
    }

    pub fn get(&self, id: &HostId) -> Option<&Host> {
        self.hosts.iter().find(|h| &h.id == id)
    }
}

impl<'a> IntoIterator for &'a HostSet {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}
