mod cli;
mod commands;
mod config;
mod exit;
mod logging;
mod paths;
mod progress;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use dispatch::CodedError;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        ui::error(&render(&e));
        return exit_code(&e);
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match dispatch_command(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&render(&e));
            exit_code(&e)
        }
    }
}

/// Shell logging follows `-v`/`-q`; the log file has its own level.
///
/// Completions never open a log file.
fn init_logging(cli: &Cli) -> Result<()> {
    let shell_level = match (cli.quiet, cli.verbose) {
        (true, _) => log::LevelFilter::Error,
        (false, 0) => log::LevelFilter::Warn,
        (false, 1) => log::LevelFilter::Info,
        (false, 2) => log::LevelFilter::Debug,
        (false, _) => log::LevelFilter::Trace,
    };
    let shell = logging::shell_logger(shell_level, cli.verbose > 0);

    let file_level = cli.log_level.filter();
    let file = if file_level == log::LevelFilter::Off
        || matches!(cli.command, Command::Completions { .. })
    {
        None
    } else {
        let opened = logging::log_dir(cli.log_dir.as_deref())
            .and_then(|dir| logging::FileLog::open(&dir, file_level))
            .map_err(|e| CodedError::wrap(exit::CONFIG_INVALID, e))?;
        Some(opened)
    };

    let path = file.as_ref().map(|f| f.path().to_path_buf());
    logging::install(logging::TeeLogger::new(shell, file))?;
    if let Some(path) = path {
        log::info!("{} started, logging to {}", logging::PROGRAM, path.display());
    }
    Ok(())
}

fn dispatch_command(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Run(args) => commands::run::run(ctx, args),
        Command::Ping(args) => commands::run::ping(ctx, args),
        Command::Hosts(args) => commands::hosts::run(ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "gpcluster", &mut io::stdout());
            Ok(())
        }
    }
}

/// One-line rendering of an error and its causes.
///
/// A [`CodedError`] already shows its cause, so only its own cause chain is
/// expanded.
fn render(err: &anyhow::Error) -> String {
    match err.downcast_ref::<CodedError>() {
        Some(coded) => format!("ERROR[{}] {:#}", coded.code(), coded.cause()),
        None => format!("{err:#}"),
    }
}

/// Exit status carried by the first [`CodedError`] in the chain
fn exit_code(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
        .map_or(ExitCode::FAILURE, |coded| {
            ExitCode::from(coded.code().exit_status())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;

    #[test]
    fn test_exit_code_from_coded_error() {
        let err: anyhow::Error = CodedError::new(exit::CONFIG_INVALID, "bad file").into();
        assert_eq!(exit_code(&err), ExitCode::from(3));
    }

    #[test]
    fn test_exit_code_through_context() {
        let err = Err::<(), _>(CodedError::new(exit::ENGINE_FAULT, "broken"))
            .context("while running")
            .unwrap_err();
        assert_eq!(exit_code(&err), ExitCode::from(70));
    }

    #[test]
    fn test_render_does_not_repeat_cause() {
        let cause = anyhow::anyhow!("no such file").context("Could not read cluster file");
        let err: anyhow::Error = CodedError::wrap(exit::CONFIG_INVALID, cause).into();
        assert_eq!(
            render(&err),
            "ERROR[3] Could not read cluster file: no such file"
        );
        assert_eq!(render(&anyhow::anyhow!("plain")), "plain");
    }

    #[test]
    fn test_exit_code_without_code() {
        assert_eq!(exit_code(&anyhow::anyhow!("plain")), ExitCode::FAILURE);
    }
}
