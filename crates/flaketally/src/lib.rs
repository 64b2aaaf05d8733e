//! Flaketally: repeat a test, count how often it fails
//!
//! Runs one external test command many times in a row, decodes the
//! structured report each run prints, and writes a per-test failure count
//! to a timestamped file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   RunResult   ┌──────────────┐  FailureRecord  ┌──────────────┐
//! │ Executor     │──────────────►│ ReportFormat │────────────────►│ FailureTally │
//! │ (child proc) │               │ (decode)     │                 │              │
//! └──────────────┘               └──────────────┘                 └──────┬───────┘
//!        ▲                                                               │
//!        │ one iteration at a time                                       ▼
//! ┌──────┴───────┐                                                ┌──────────────┐
//! │ Harness      │───────────────────────────────────────────────►│ ReportFile   │
//! └──────────────┘                                                └──────────────┘
//! ```

#![warn(missing_docs)]

mod command;
mod error;
mod harness;
mod report;
mod report_file;
mod tally;

pub use command::{Executor, ProcessExecutor, RunResult, TestCommand, DEFAULT_GREP};
pub use error::{HarnessError, HarnessResult};
pub use harness::{
    Harness, HarnessConfig, HarnessObserver, HarnessOutcome, IterationStatus, NoopObserver,
    DEFAULT_ITERATIONS,
};
pub use report::{FailureRecord, ReportFormat};
pub use report_file::{
    format_line, parse_report, report_file_name, ReportFile, WrittenReport, REPORT_PREFIX,
};
pub use tally::FailureTally;
