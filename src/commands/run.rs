use anyhow::Result;
use colored::Colorize;
use dispatch::{
    CodedError, DispatchResult, DispatchStatus, DispatchSummary, Dispatcher, HostExecutor, HostId,
    HostSet, LogFacade, Outcome, classify, reduce,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::Context;
use crate::cli::{DispatchArgs, PingArgs, RunArgs, SelectionArgs};
use crate::config::ClusterConfig;
use crate::exit;
use crate::progress::BarProgress;
use crate::runner;
use crate::ui;

/// Remote command used to check reachability
const PING_COMMAND: &str = "hostname";

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let template = args.command.join(" ");
    let config = super::load_cluster(ctx)?;
    let retries = args.dispatch.retries.unwrap_or(config.dispatch.retries);
    let executor = runner::executor(&template, args.local, &config.ssh, retries);

    let report = execute(
        ctx,
        &config,
        &args.selection,
        &args.dispatch,
        executor.as_ref(),
        &template,
        args.json,
    )?;
    report.finish()
}

pub fn ping(ctx: &Context, args: PingArgs) -> Result<()> {
    let config = super::load_cluster(ctx)?;
    let retries = args.dispatch.retries.unwrap_or(config.dispatch.retries);
    let executor = runner::executor(PING_COMMAND, false, &config.ssh, retries);

    let report = execute(
        ctx,
        &config,
        &args.selection,
        &args.dispatch,
        executor.as_ref(),
        "ping",
        args.json,
    )?;
    report.finish()
}

/// A finished dispatch, printed and ready to be reduced
pub struct Report {
    pub result: DispatchResult,
}

impl Report {
    /// Reduce to the command's outcome; any failing host is an error
    pub fn finish(self) -> Result<()> {
        reduce(&self.result, exit::HOSTS_FAILED).into_result()?;
        Ok(())
    }
}

/// Select hosts, dispatch `op` to them and print the outcomes
pub fn execute(
    ctx: &Context,
    config: &ClusterConfig,
    selection: &SelectionArgs,
    dispatch_args: &DispatchArgs,
    op: &dyn HostExecutor,
    label: &str,
    json: bool,
) -> Result<Report> {
    let hosts = super::select(config, selection)?;
    let policy = config.policy(dispatch_args.jobs, dispatch_args.fail_fast);

    // The report always goes to the log file; the shell logger only shows it
    // when verbose
    let mut dispatcher = Dispatcher::new(policy).with_sink(Arc::new(LogFacade));
    let progress = if ctx.quiet || json || hosts.is_empty() {
        BarProgress::hidden()
    } else {
        BarProgress::new(label)
    };
    dispatcher = dispatcher.with_progress(Arc::new(progress));

    let result = dispatcher.run(&hosts, op).map_err(|e| {
        let code = if e.is_internal() {
            exit::ENGINE_FAULT
        } else {
            exit::CONFIG_INVALID
        };
        CodedError::wrap(code, e)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::new(&result))?);
    } else if !ctx.quiet {
        print_outcomes(&hosts, &result, label);
    }

    Ok(Report { result })
}

fn print_outcomes(hosts: &HostSet, result: &DispatchResult, label: &str) {
    if hosts.is_empty() {
        ui::warn("No hosts selected");
        return;
    }

    ui::header(label);
    for host in hosts {
        let Some(outcome) = result.get(&host.id) else {
            continue;
        };
        match outcome {
            Outcome::Success { output } => {
                println!("  {} {}", "✓".green(), host.id);
                if !output.trim().is_empty() {
                    println!("{}", ui::indent(output, 6).dimmed());
                }
            }
            Outcome::Failed { error } => {
                println!("  {} {}", "✗".red(), host.id);
                println!("{}", ui::indent(error, 6).red());
            }
            Outcome::Cancelled => {
                println!(
                    "  {} {} {}",
                    "-".dimmed(),
                    host.id,
                    "(not attempted)".dimmed()
                );
            }
        }
    }

    let summary = result.summary();
    println!();
    if summary.is_success() {
        ui::success(&format!("{} succeeded", ui::count(summary.total(), "host")));
    } else {
        ui::kv("Succeeded", &summary.succeeded.to_string());
        ui::kv("Failed", &summary.failed.to_string());
        if summary.cancelled > 0 {
            ui::kv("Not attempted", &summary.cancelled.to_string());
        }
    }
}

/// Machine-readable dispatch result
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub status: DispatchStatus,
    pub summary: DispatchSummary,
    pub outcomes: &'a BTreeMap<HostId, Outcome>,
}

impl<'a> JsonReport<'a> {
    pub fn new(result: &'a DispatchResult) -> Self {
        Self {
            status: classify(result),
            summary: result.summary(),
            outcomes: result.outcomes(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
