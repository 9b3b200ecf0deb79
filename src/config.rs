//! Cluster description loaded from TOML

use anyhow::{Context, Result, bail};
use dispatch::{Cluster, Host, Policy, Role};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::paths;

/// Top-level cluster file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub coordinator: Option<CoordinatorConfig>,

    #[serde(default)]
    pub segments: Vec<SegmentConfig>,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(default)]
    pub ssh: SshSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub hostname: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub content: i32,
    pub role: Role,
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub data_dir: Option<String>,
}

/// Defaults for dispatches, overridable per command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
    #[serde(default)]
    pub retries: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            continue_on_error: default_continue_on_error(),
            retries: 0,
        }
    }
}

fn default_jobs() -> usize {
    16
}

fn default_continue_on_error() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// ssh binary to invoke
    #[serde(default = "default_ssh_program")]
    pub program: String,
    /// Remote user; ssh's own default applies when unset
    #[serde(default)]
    pub user: Option<String>,
    /// Extra arguments placed before the destination
    #[serde(default)]
    pub options: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            program: default_ssh_program(),
            user: None,
            options: Vec::new(),
        }
    }
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

impl ClusterConfig {
    /// Load the cluster file, resolving its location from `explicit` or the
    /// environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = paths::config_file(explicit)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read cluster file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid cluster file {}", path.display()))?;
        log::debug!(
            "Loaded cluster file {} ({} segments)",
            path.display(),
            config.segments.len()
        );
        Ok(config)
    }

    /// Validate the cluster layout
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.jobs == 0 {
            bail!("dispatch.jobs must be at least 1");
        }

        let mut endpoints = HashSet::new();
        if let Some(coordinator) = &self.coordinator {
            if coordinator.hostname.trim().is_empty() {
                bail!("coordinator hostname cannot be empty");
            }
            endpoints.insert((coordinator.hostname.as_str(), coordinator.port));
        }

        let mut roles_per_content: HashMap<(i32, Role), usize> = HashMap::new();
        for segment in &self.segments {
            if segment.hostname.trim().is_empty() {
                bail!("segment {} has an empty hostname", segment.content);
            }
            if segment.content < 0 {
                bail!(
                    "segment {}:{} has negative content id {}",
                    segment.hostname,
                    segment.port,
                    segment.content
                );
            }
            if segment.role == Role::Coordinator {
                bail!(
                    "segment {}:{} cannot have role coordinator",
                    segment.hostname,
                    segment.port
                );
            }
            if !endpoints.insert((segment.hostname.as_str(), Some(segment.port))) {
                bail!(
                    "{}:{} is listed more than once",
                    segment.hostname,
                    segment.port
                );
            }

            let count = roles_per_content
                .entry((segment.content, segment.role))
                .or_default();
            *count += 1;
            if *count > 1 {
                bail!(
                    "content {} has more than one {}",
                    segment.content,
                    segment.role
                );
            }
        }

        Ok(())
    }

    /// Build the engine's view of the cluster
    pub fn cluster(&self) -> Cluster {
        let coordinator = self.coordinator.as_ref().map(|c| {
            let mut host = Host::coordinator(&c.hostname);
            if let Some(port) = c.port {
                host = host.with_port(port);
            }
            if let Some(dir) = &c.data_dir {
                host = host.with_data_dir(dir);
            }
            host
        });

        let segments = self
            .segments
            .iter()
            .map(|s| {
                let host = Host::segment(s.content, s.role, &s.hostname, s.port);
                match &s.data_dir {
                    Some(dir) => host.with_data_dir(dir),
                    None => host,
                }
            })
            .collect();

        Cluster::new(coordinator, segments)
    }

    /// Dispatch policy from the file, with command-line overrides applied
    pub fn policy(&self, jobs: Option<usize>, fail_fast: bool) -> Policy {
        Policy {
            continue_on_error: self.dispatch.continue_on_error && !fail_fast,
            max_concurrency: jobs.unwrap_or(self.dispatch.jobs),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch::Scope;

    const EXAMPLE: &str = r#"
[coordinator]
hostname = "cdw"
port = 5432
data_dir = "/data/coordinator/gpseg-1"

[[segments]]
content = 0
role = "primary"
hostname = "sdw1"
port = 6000
data_dir = "/data/primary/gpseg0"

[[segments]]
content = 1
role = "primary"
hostname = "sdw2"
port = 6000
data_dir = "/data/primary/gpseg1"

[[segments]]
content = 0
role = "mirror"
hostname = "sdw2"
port = 7000
data_dir = "/data/mirror/gpseg0"

[dispatch]
jobs = 4
continue_on_error = false
retries = 2

[ssh]
user = "gpadmin"
options = ["-o", "ConnectTimeout=10"]
"#;

    #[test]
    fn test_parse_example_config() {
        let config: ClusterConfig = toml::from_str(EXAMPLE).expect("Failed to parse config");
        config.validate().unwrap();

        assert_eq!(config.coordinator.as_ref().unwrap().hostname, "cdw");
        assert_eq!(config.segments.len(), 3);
        assert_eq!(config.segments[2].role, Role::Mirror);
        assert_eq!(config.dispatch.jobs, 4);
        assert!(!config.dispatch.continue_on_error);
        assert_eq!(config.dispatch.retries, 2);
        assert_eq!(config.ssh.user.as_deref(), Some("gpadmin"));
        assert_eq!(config.ssh.program, "ssh");
    }

    #[test]
    fn test_defaults() {
        let config: ClusterConfig = toml::from_str("").unwrap();
        assert_eq!(config.dispatch.jobs, 16);
        assert!(config.dispatch.continue_on_error);
        assert!(config.coordinator.is_none());
        assert!(config.ssh.options.is_empty());
    }

    #[test]
    fn test_cluster_conversion() {
        let config: ClusterConfig = toml::from_str(EXAMPLE).unwrap();
        let cluster = config.cluster();

        let coordinator = cluster.coordinator.as_ref().unwrap();
        assert_eq!(coordinator.id.as_str(), "cdw:5432");
        assert_eq!(coordinator.content_id, Some(-1));

        let set = cluster.select(Scope::segments().with_mirrors()).unwrap();
        let ids: Vec<&str> = set.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["sdw1:6000", "sdw2:6000", "sdw2:7000"]);
        assert_eq!(
            set.as_slice()[0].data_dir.as_deref(),
            Some("/data/primary/gpseg0")
        );
    }

    #[test]
    fn test_policy_overrides() {
        let config: ClusterConfig = toml::from_str("").unwrap();
        assert_eq!(config.policy(None, false), Policy::continue_on_error(16));
        assert_eq!(config.policy(Some(2), true), Policy::fail_fast(2));
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let toml = r#"
[[segments]]
content = 0
role = "primary"
hostname = "sdw1"
port = 6000

[[segments]]
content = 1
role = "primary"
hostname = "sdw1"
port = 6000
"#;
        let config: ClusterConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sdw1:6000 is listed more than once"));
    }

    #[test]
    fn test_two_primaries_for_one_content_rejected() {
        let toml = r#"
[[segments]]
content = 0
role = "primary"
hostname = "sdw1"
port = 6000

[[segments]]
content = 0
role = "primary"
hostname = "sdw2"
port = 6000
"#;
        let config: ClusterConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("content 0 has more than one primary"));
    }

    #[test]
    fn test_segment_validation() {
        let mut config: ClusterConfig = toml::from_str(EXAMPLE).unwrap();
        config.segments[0].content = -1;
        assert!(config.validate().is_err());

        let mut config: ClusterConfig = toml::from_str(EXAMPLE).unwrap();
        config.segments[0].role = Role::Coordinator;
        assert!(config.validate().is_err());

        let mut config: ClusterConfig = toml::from_str(EXAMPLE).unwrap();
        config.dispatch.jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        fs::write(&path, EXAMPLE).unwrap();

        let config = ClusterConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.segments.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClusterConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read cluster file"));
    }
}
