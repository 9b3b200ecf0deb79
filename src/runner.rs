//! Host executors that run shell commands, remotely over ssh or locally

use anyhow::Result;
use dispatch::{Host, HostExecutor, RetryConfig, Retrying};
use std::io;
use std::process::{Command, Output};
use thiserror::Error;

use crate::config::SshSettings;

/// Exit status ssh uses for its own failures, and also passes through when
/// the remote command exits 255
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Stderr line prefixes written by the ssh client itself when it never
/// reached a remote shell
const SSH_CLIENT_ERRORS: &[&str] = &[
    "ssh:",
    "kex_exchange_identification:",
    "Connection closed by",
    "Connection timed out during banner exchange",
];

/// Why a command failed on a host
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{}", exit_message(*.code, .stderr))]
    Exit { code: Option<i32>, stderr: String },
}

fn exit_message(code: Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    };
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}

/// Expand per-host placeholders in a command template.
///
/// Supported: `{host}`, `{port}`, `{content}`, `{datadir}`, `{role}`.
/// Values a host does not have expand to the empty string.
pub fn expand_template(template: &str, host: &Host) -> String {
    let port = host.port.map(|p| p.to_string()).unwrap_or_default();
    let content = host.content_id.map(|c| c.to_string()).unwrap_or_default();
    template
        .replace("{host}", &host.hostname)
        .replace("{port}", &port)
        .replace("{content}", &content)
        .replace("{datadir}", host.data_dir.as_deref().unwrap_or_default())
        .replace("{role}", host.role.as_str())
}

/// Runs a command template on each host through the system ssh client
pub struct SshExecutor {
    template: String,
    ssh: SshSettings,
}

impl SshExecutor {
    pub fn new(template: impl Into<String>, ssh: SshSettings) -> Self {
        Self {
            template: template.into(),
            ssh,
        }
    }

    /// Arguments passed to the ssh program for `host`
    pub fn args(&self, host: &Host) -> Vec<String> {
        let destination = match &self.ssh.user {
            Some(user) => format!("{user}@{}", host.hostname),
            None => host.hostname.clone(),
        };

        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        args.extend(self.ssh.options.iter().cloned());
        args.push(destination);
        args.push(expand_template(&self.template, host));
        args
    }
}

impl HostExecutor for SshExecutor {
    fn execute(&self, host: &Host) -> Result<String> {
        let args = self.args(host);
        log::debug!("{}: {} {}", host.id, self.ssh.program, args.join(" "));
        let output = Command::new(&self.ssh.program)
            .args(&args)
            .output()
            .map_err(|source| CommandError::Spawn {
                program: self.ssh.program.clone(),
                source,
            })?;
        into_result(output)
    }
}

/// Runs a command template locally with `sh -c`, once per host.
///
/// The host's fields are also exported as `GPCLUSTER_HOST`, `GPCLUSTER_PORT`,
/// `GPCLUSTER_CONTENT`, `GPCLUSTER_DATADIR` and `GPCLUSTER_ROLE`.
pub struct LocalExecutor {
    template: String,
}

impl LocalExecutor {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl HostExecutor for LocalExecutor {
    fn execute(&self, host: &Host) -> Result<String> {
        let command = expand_template(&self.template, host);
        log::debug!("{}: sh -c {command}", host.id);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .env("GPCLUSTER_HOST", &host.hostname)
            .env(
                "GPCLUSTER_PORT",
                host.port.map(|p| p.to_string()).unwrap_or_default(),
            )
            .env(
                "GPCLUSTER_CONTENT",
                host.content_id.map(|c| c.to_string()).unwrap_or_default(),
            )
            .env(
                "GPCLUSTER_DATADIR",
                host.data_dir.as_deref().unwrap_or_default(),
            )
            .env("GPCLUSTER_ROLE", host.role.as_str())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: "sh".to_string(),
                source,
            })?;
        into_result(output)
    }
}

fn into_result(output: Output) -> Result<String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    } else {
        Err(CommandError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
        .into())
    }
}

/// Whether an error is ssh failing to reach the host, as opposed to the
/// remote command failing.
///
/// Exit status 255 alone is not enough: a remote command exiting 255 looks
/// the same, and by then it has already run. Only a 255 whose stderr carries
/// the ssh client's own diagnostics counts. A missing ssh program is
/// permanent and never counts.
pub fn is_connection_error(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<CommandError>() {
        Some(CommandError::Exit {
            code: Some(SSH_CONNECTION_FAILURE),
            stderr,
        }) => stderr.lines().map(str::trim_start).any(|line| {
            SSH_CLIENT_ERRORS
                .iter()
                .any(|prefix| line.starts_with(prefix))
        }),
        _ => false,
    }
}

/// Build the executor for a command.
///
/// Remote executors retry connection failures `retries` times. Local ones
/// never retry.
pub fn executor(
    template: &str,
    local: bool,
    ssh: &SshSettings,
    retries: u32,
) -> Box<dyn HostExecutor> {
    if local {
        return Box::new(LocalExecutor::new(template));
    }

    let ssh = SshExecutor::new(template, ssh.clone());
    if retries == 0 {
        Box::new(ssh)
    } else {
        Box::new(
            Retrying::new(ssh, RetryConfig::with_retries(retries)).when(is_connection_error),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
