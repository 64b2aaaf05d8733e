//! Output formatting and progress reporting

use console::{style, Style, Term};
use flaketally::{HarnessObserver, HarnessOutcome, IterationStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::Mutex;

/// Bar currently drawn on stderr
static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn set_active_bar(bar: Option<ProgressBar>) {
    if let Ok(mut slot) = ACTIVE_BAR.lock() {
        *slot = bar;
    }
}

/// `tracing` writer for stderr that hides the active progress bar while a
/// log line is printed, so the bar is redrawn below it instead of torn
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bar = ACTIVE_BAR.lock().ok().and_then(|slot| slot.as_ref().cloned());
        match bar {
            Some(pb) => pb.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Progress reporter for harness runs
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// One line per iteration instead of a progress bar
    pub verbose: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
            verbose: false,
        }
    }

    /// Print a line for every iteration instead of drawing a progress bar
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Start a progress bar over `total` iterations
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || self.verbose {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        set_active_bar(Some(pb.clone()));
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message("Done");
            set_active_bar(None);
        }
    }

    fn write_line(&self, line: &str) {
        // Printing through the bar keeps it from being torn by our own output.
        match self.progress_bar {
            Some(ref pb) if !pb.is_finished() => pb.println(line),
            _ => {
                if let Err(e) = self.term.write_line(line) {
                    tracing::debug!(error = %e, "failed to write to terminal");
                }
            }
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, paint: fn(&str) -> String) -> String {
        if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefixed("✓", "PASS", |s| style(s).green().bold().to_string());
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = self.prefixed("✗", "FAIL", |s| style(s).red().bold().to_string());
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefixed("⚠", "WARN", |s| style(s).yellow().bold().to_string());
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefixed("ℹ", "INFO", |s| style(s).blue().bold().to_string());
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.write_line("");
        self.write_line(&styled);
    }

    /// Print the end-of-run summary
    pub fn summary(&self, outcome: &HarnessOutcome) {
        let tally = &outcome.tally;
        if self.quiet && tally.is_empty() {
            return;
        }

        self.write_line("");

        for (title, count) in tally.entries() {
            let rate = tally.failure_rate(title) * 100.0;
            let line = format!("{count:>4}x ({rate:5.1}%)  {title}");
            if self.use_color {
                self.write_line(&Style::new().red().apply_to(line).to_string());
            } else {
                self.write_line(&line);
            }
        }

        let status = if tally.is_empty() { "STABLE" } else { "FLAKY" };
        let status = if self.use_color {
            if tally.is_empty() {
                Style::new().green().bold().apply_to(status).to_string()
            } else {
                Style::new().red().bold().apply_to(status).to_string()
            }
        } else {
            status.to_string()
        };

        self.write_line(&format!(
            "{status} {} iterations in {:.2}s ({} tallied, {} spawn errors, {} timeouts, {} undecodable; {} failing tests)",
            tally.iterations(),
            outcome.duration.as_secs_f64(),
            tally.tallied(),
            outcome.spawn_failures,
            outcome.timeouts,
            outcome.decode_failures,
            tally.len(),
        ));
    }
}

impl HarnessObserver for ProgressReporter {
    fn iteration_started(&mut self, index: u32, total: u32) {
        if index == 0 {
            self.start_progress(u64::from(total), "Starting...");
        }
        self.set_message(&format!("iteration #{index}"));
    }

    fn iteration_finished(&mut self, index: u32, status: &IterationStatus) {
        match status {
            IterationStatus::Tallied { failures } if failures.is_empty() => {
                if self.verbose {
                    self.success(&format!("iteration #{index}"));
                }
            }
            IterationStatus::Tallied { failures } => {
                self.failure(&format!("iteration #{index}: {}", failures.join(", ")));
            }
            IterationStatus::SpawnFailed { message }
            | IterationStatus::TimedOut { message }
            | IterationStatus::DecodeFailed { message } => {
                self.warning(&format!("iteration #{index} skipped: {message}"));
            }
        }
        self.increment(1);
    }
}
