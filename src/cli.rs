use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gpcluster")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Run commands across the hosts of a segment database cluster", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Cluster file (defaults to $GPCLUSTER_CONFIG or ~/.config/gpcluster/cluster.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for the log file (defaults to ~/gpAdminLogs)
    #[arg(long, global = true, value_name = "DIR", env = "GPCLUSTER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log file verbosity, independent of -v/-q
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogLevelArg::Debug,
        env = "GPCLUSTER_LOG_LEVEL"
    )]
    pub log_level: LogLevelArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a command on every selected host
    Run(RunArgs),

    /// Check that every selected host is reachable
    Ping(PingArgs),

    /// List the hosts a selection resolves to
    Hosts(HostsArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared Arguments
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    /// Do not write a log file
    Off,
    Error,
    Warn,
    Info,
    #[default]
    Debug,
    Trace,
}

impl LogLevelArg {
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// One execution per segment instance
    #[default]
    Segments,
    /// One execution per distinct hostname
    Hosts,
}

/// Which cluster members a command targets
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Target segment instances or distinct machines
    #[arg(long, value_enum, default_value_t = ScopeArg::Segments)]
    pub scope: ScopeArg,

    /// Include the coordinator
    #[arg(long)]
    pub coordinator: bool,

    /// Include mirror segments
    #[arg(long)]
    pub mirrors: bool,
}

/// How a dispatch runs
#[derive(Args, Debug, Clone, Default)]
pub struct DispatchArgs {
    /// Maximum hosts to run on at once (defaults to dispatch.jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Stop starting new hosts after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Retry ssh connection failures this many times (defaults to dispatch.retries)
    #[arg(long)]
    pub retries: Option<u32>,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command to run; supports {host}, {port}, {content}, {datadir} and {role}
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub dispatch: DispatchArgs,

    /// Run the command locally once per host instead of over ssh
    #[arg(long)]
    pub local: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub dispatch: DispatchArgs,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct HostsArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Print the hosts as JSON
    #[arg(long)]
    pub json: bool,
}
