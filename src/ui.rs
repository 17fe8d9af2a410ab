//! Startup stage reporting for the binaries.
//!
//! Each stage shows a spinner on a terminal (or a plain `==> stage` line
//! otherwise) and prints its outcome and duration when the guard drops. A
//! stage that is dropped without `done` is reported as failed, so an early
//! `?` return still leaves a readable trail.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    #[default]
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    /// Detects the terminal on stderr; `NO_COLOR` turns `Auto` into plain output.
    pub fn detect(mode: UiMode) -> Self {
        let disable_pretty = std::env::var_os("NO_COLOR").is_some();
        Self::new(mode, std::io::stderr().is_terminal(), disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    detail: Option<String>,
    completed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            detail: None,
            completed: false,
        }
    }

    /// Marks the stage successful, with an optional detail for the summary line.
    pub fn done(mut self, detail: impl Into<Option<String>>) {
        self.detail = detail.into();
        self.completed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = stage_line(
            &self.name,
            self.completed,
            self.detail.as_deref(),
            self.start.elapsed(),
        );
        match &self.spinner {
            Some(spinner) if self.completed => spinner.finish_with_message(message),
            Some(spinner) => spinner.abandon_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn stage_line(name: &str, completed: bool, detail: Option<&str>, elapsed: Duration) -> String {
    let mark = if completed { '✔' } else { '✘' };
    match detail {
        Some(detail) => format!("{mark} {name}: {detail} ({})", format_duration(elapsed)),
        None => format!("{mark} {name} ({})", format_duration(elapsed)),
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
