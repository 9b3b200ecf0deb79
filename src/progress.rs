//! Progress bar for dispatches

use colored::Colorize;
use dispatch::{DispatchProgress, Host, Outcome};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Shows hosts completing on stderr; failures are printed above the bar as
/// they happen
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new(label: &str) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.set_message(label.to_string());
        Self { pb }
    }

    /// A bar that never draws or prints
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.pb.is_hidden()
    }
}

impl DispatchProgress for BarProgress {
    fn on_dispatch_start(&self, total: usize) {
        self.pb.set_length(total as u64);
    }

    fn on_host_start(&self, host: &Host) {
        self.pb.set_message(host.id.to_string());
    }

    fn on_host_complete(&self, host: &Host, outcome: &Outcome) {
        if let Some(error) = outcome.error().filter(|_| !self.is_hidden()) {
            let first_line = error.lines().next().unwrap_or_default();
            self.pb
                .suspend(|| eprintln!("  {} {} ({})", "✗".red(), host.id, first_line));
        }
        self.pb.inc(1);
    }

    fn on_dispatch_complete(&self) {
        self.pb.finish_and_clear();
    }
}
