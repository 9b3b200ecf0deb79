//! Path resolution for gpcluster
//!
//! # Environment Variables
//!
//! - `GPCLUSTER_CONFIG` - Path of the cluster file itself
//! - `GPCLUSTER_CONFIG_DIR` - Override config directory
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. `--config` flag
//! 2. `GPCLUSTER_CONFIG` environment variable
//! 3. `cluster.toml` inside config_dir()
//!
//! For config_dir():
//! 1. `GPCLUSTER_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/gpcluster` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\gpcluster`
//!    - macOS/Linux: `~/.config/gpcluster`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the cluster file path
pub const ENV_CONFIG_FILE: &str = "GPCLUSTER_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "GPCLUSTER_CONFIG_DIR";

/// Name of the cluster file inside the config directory
pub const CLUSTER_FILE: &str = "cluster.toml";

/// Get the gpcluster config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("gpcluster");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("gpcluster");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("gpcluster");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Resolve the cluster file, preferring an explicit `--config` path
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand(&path.to_string_lossy()));
    }

    if let Ok(file) = std::env::var(ENV_CONFIG_FILE) {
        let path = expand(&file);
        log::debug!("Using cluster file from {}: {}", ENV_CONFIG_FILE, path.display());
        return Ok(path);
    }

    Ok(config_dir()?.join(CLUSTER_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with `vars` set (`Some`) or removed (`None`), restoring them after
    fn with_env<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let originals: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, _)| ((*key).to_string(), env::var(key).ok()))
            .collect();

        for (key, value) in vars {
            // SAFETY: ENV_LOCK keeps env-mutating tests from running concurrently
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
        let result = f();
        for (key, value) in originals {
            // SAFETY: as above
            match value {
                Some(v) => unsafe { env::set_var(&key, v) },
                None => unsafe { env::remove_var(&key) },
            }
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env(&[(ENV_CONFIG_DIR, Some("/custom/config/path"))], || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/config/path"));
        });
    }

    #[test]
    fn test_config_dir_xdg() {
        with_env(
            &[
                (ENV_CONFIG_DIR, None),
                ("XDG_CONFIG_HOME", Some("/tmp/xdg-config-test")),
            ],
            || {
                assert_eq!(
                    config_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-config-test/gpcluster")
                );
            },
        );
    }

    #[test]
    fn test_config_file_explicit_wins() {
        with_env(&[(ENV_CONFIG_FILE, Some("/from/env.toml"))], || {
            let path = config_file(Some(Path::new("/from/flag.toml"))).unwrap();
            assert_eq!(path, PathBuf::from("/from/flag.toml"));
        });
    }

    #[test]
    fn test_config_file_env() {
        with_env(&[(ENV_CONFIG_FILE, Some("/from/env.toml"))], || {
            assert_eq!(config_file(None).unwrap(), PathBuf::from("/from/env.toml"));
        });
    }

    #[test]
    fn test_config_file_defaults_to_config_dir() {
        with_env(
            &[(ENV_CONFIG_FILE, None), (ENV_CONFIG_DIR, Some("/etc/gpcluster"))],
            || {
                assert_eq!(
                    config_file(None).unwrap(),
                    PathBuf::from("/etc/gpcluster/cluster.toml")
                );
            },
        );
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
