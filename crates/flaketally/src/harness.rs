//! Repetition harness
//!
//! Runs one test command a fixed number of times, strictly one after
//! another, decodes each run's report and tallies failures per test title.
//! Concurrent runs interfere with the shared automation target and inflate
//! the very flakiness being measured, so iterations never overlap.
//!
//! Nothing that goes wrong inside an iteration stops the run: spawn
//! failures, timeouts and undecodable output are logged, the iteration is
//! skipped, and the loop moves on. There are no retries.

use crate::command::{Executor, ProcessExecutor, RunResult, TestCommand, DEFAULT_GREP};
use crate::error::{HarnessError, HarnessResult};
use crate::report::ReportFormat;
use crate::report_file::{ReportFile, WrittenReport};
use crate::tally::FailureTally;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Iterations per harness execution unless configured otherwise
pub const DEFAULT_ITERATIONS: u32 = 32;

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of iterations to run
    pub iterations: u32,
    /// Directory the report file is written to
    pub output_dir: PathBuf,
    /// Report format the command emits on stdout
    pub format: ReportFormat,
    /// Test command to repeat
    pub command: TestCommand,
    /// Per-iteration timeout
    pub timeout: Option<Duration>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            output_dir: PathBuf::from("."),
            format: ReportFormat::Mocha,
            command: TestCommand::mocha(DEFAULT_GREP),
            timeout: None,
        }
    }
}

impl HarnessConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set iteration count
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set report format
    #[must_use]
    pub const fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Set test command
    #[must_use]
    pub fn with_command(mut self, command: TestCommand) -> Self {
        self.command = command;
        self
    }

    /// Set per-iteration timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the configuration is runnable
    ///
    /// # Errors
    ///
    /// Returns an error for zero iterations, a blank program or a zero timeout
    pub fn validate(&self) -> HarnessResult<()> {
        if self.iterations == 0 {
            return Err(HarnessError::invalid_config(
                "iterations must be at least 1",
            ));
        }
        if self.command.program.trim().is_empty() {
            return Err(HarnessError::invalid_config("test command is empty"));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(HarnessError::invalid_config("timeout must be positive"));
        }
        Ok(())
    }
}

/// What happened in one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IterationStatus {
    /// Report decoded; distinct failing titles
    Tallied {
        /// Titles reported failed
        failures: Vec<String>,
    },
    /// Command could not run
    SpawnFailed {
        /// Error message
        message: String,
    },
    /// Command exceeded the timeout
    TimedOut {
        /// Error message
        message: String,
    },
    /// Output was not a report
    DecodeFailed {
        /// Error message
        message: String,
    },
}

impl IterationStatus {
    /// Whether the iteration contributed to the tally
    #[must_use]
    pub const fn is_tallied(&self) -> bool {
        matches!(self, Self::Tallied { .. })
    }

    /// Whether the iteration reported failing tests
    #[must_use]
    pub fn has_failures(&self) -> bool {
        matches!(self, Self::Tallied { failures } if !failures.is_empty())
    }
}

/// Progress hooks called by the run loop
pub trait HarnessObserver: Send {
    /// Iteration `index` (zero-based) of `total` is about to start
    fn iteration_started(&mut self, _index: u32, _total: u32) {}

    /// Iteration `index` has finished
    fn iteration_finished(&mut self, _index: u32, _status: &IterationStatus) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl HarnessObserver for NoopObserver {}

/// Final result of a harness execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessOutcome {
    /// Failure counts
    pub tally: FailureTally,
    /// Iterations whose command could not run
    pub spawn_failures: u32,
    /// Iterations killed by the timeout
    pub timeouts: u32,
    /// Iterations whose output did not decode
    pub decode_failures: u32,
    /// Written report, if the file could be created
    pub report: Option<WrittenReport>,
    /// Why the report could not be written
    pub persist_error: Option<String>,
    /// When the report was stamped
    pub finished_at: DateTime<Utc>,
    /// Total run time
    pub duration: Duration,
}

impl HarnessOutcome {
    /// Whether any test failed in any iteration
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.tally.is_empty()
    }

    /// Path of the written report
    #[must_use]
    pub fn report_path(&self) -> Option<&std::path::Path> {
        self.report.as_ref().map(|r| r.path.as_path())
    }
}

/// Repeats a test command and tallies its failures
#[derive(Debug)]
pub struct Harness<E = ProcessExecutor> {
    config: HarnessConfig,
    executor: E,
}

impl Harness<ProcessExecutor> {
    /// Create a harness that spawns real processes
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        let executor = ProcessExecutor::new().with_timeout(config.timeout);
        Self::with_executor(config, executor)
    }
}

impl<E: Executor> Harness<E> {
    /// Create a harness with a custom executor
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn with_executor(config: HarnessConfig, executor: E) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self { config, executor })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run the test command once
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot run or times out; a failing
    /// exit code is not an error
    pub async fn run_iteration(&self) -> HarnessResult<RunResult> {
        self.executor.execute(&self.config.command).await
    }

    /// Decode one iteration's stdout into `tally`
    ///
    /// On a decode error the tally is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Decode`] when stdout is not a report
    pub fn tally_iteration(
        &self,
        result: &RunResult,
        tally: &mut FailureTally,
    ) -> HarnessResult<Vec<String>> {
        let failures = self.config.format.decode(&result.stdout)?;
        for failure in &failures {
            if let Some(ref error) = failure.error {
                debug!(title = %failure.title, error = %error, "test failed");
            }
        }
        Ok(tally.record_iteration(&failures))
    }

    /// Run every iteration, then write the report
    pub async fn run(&self, observer: &mut dyn HarnessObserver) -> HarnessOutcome {
        let start = Instant::now();
        let total = self.config.iterations;
        let mut tally = FailureTally::new();
        let mut spawn_failures = 0;
        let mut timeouts = 0;
        let mut decode_failures = 0;

        info!(command = %self.config.command, iterations = total, report_format = %self.config.format, "starting harness");

        for index in 0..total {
            info!(iteration = index, "running test command");
            observer.iteration_started(index, total);

            let status = match self.run_iteration().await {
                Ok(result) => {
                    debug!(
                        iteration = index,
                        exit_code = ?result.exit_code,
                        elapsed_ms = result.duration().as_millis() as u64,
                        "test command completed"
                    );
                    match self.tally_iteration(&result, &mut tally) {
                        Ok(failures) => IterationStatus::Tallied { failures },
                        Err(e) => {
                            decode_failures += 1;
                            tally.record_skipped();
                            let raw = match e {
                                HarnessError::Decode { ref raw, .. } => raw.as_str(),
                                _ => result.stdout.as_str(),
                            };
                            warn!(iteration = index, error = %e, raw = %raw, stderr = %result.stderr, "could not decode test report");
                            IterationStatus::DecodeFailed {
                                message: e.to_string(),
                            }
                        }
                    }
                }
                Err(e @ HarnessError::Timeout { .. }) => {
                    timeouts += 1;
                    tally.record_skipped();
                    warn!(iteration = index, error = %e, "test command timed out");
                    IterationStatus::TimedOut {
                        message: e.to_string(),
                    }
                }
                Err(e) => {
                    spawn_failures += 1;
                    tally.record_skipped();
                    warn!(iteration = index, error = %e, "test command failed to run");
                    IterationStatus::SpawnFailed {
                        message: e.to_string(),
                    }
                }
            };

            observer.iteration_finished(index, &status);
        }

        let finished_at = Utc::now();
        let file = ReportFile::for_timestamp(&self.config.output_dir, finished_at);
        let (report, persist_error) = match file.write_tally(&tally).await {
            Ok(report) => {
                info!(path = %report.path.display(), failing_tests = tally.len(), "report written");
                (Some(report), None)
            }
            Err(e) => {
                warn!(error = %e, "could not write report");
                (None, Some(e.to_string()))
            }
        };

        HarnessOutcome {
            tally,
            spawn_failures,
            timeouts,
            decode_failures,
            report,
            persist_error,
            finished_at,
            duration: start.elapsed(),
        }
    }
}
