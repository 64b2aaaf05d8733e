//! Timestamped failure report files
//!
//! One file per harness execution, named
//! `test_harness_output_<ISO-8601 timestamp>.txt`, holding one
//! `<title>: <count>` line per failing test.

use crate::error::{HarnessError, HarnessResult};
use crate::tally::FailureTally;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Filename prefix of every report
pub const REPORT_PREFIX: &str = "test_harness_output_";

/// Filename for a report taken at `at` (UTC, millisecond precision)
#[must_use]
pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("{REPORT_PREFIX}{}.txt", at.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
}

/// One report line, newline-terminated
///
/// Line breaks inside a title would split the entry, so they become spaces.
#[must_use]
pub fn format_line(title: &str, count: u32) -> String {
    let title = title.replace(['\r', '\n'], " ");
    format!("{title}: {count}\n")
}

/// Result of writing a tally to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenReport {
    /// File the lines went to
    pub path: PathBuf,
    /// Lines appended successfully
    pub lines_written: usize,
    /// Lines that could not be appended
    pub lines_failed: usize,
}

impl WrittenReport {
    /// Whether every line made it to disk
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.lines_failed == 0
    }
}

/// A report file location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    path: PathBuf,
}

impl ReportFile {
    /// Report file in `dir` stamped with `at`
    #[must_use]
    pub fn for_timestamp(dir: &Path, at: DateTime<Utc>) -> Self {
        Self {
            path: dir.join(report_file_name(at)),
        }
    }

    /// Report file at an explicit path
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file and append one line per tally entry
    ///
    /// The file is created even for an empty tally. A line that fails to
    /// append is logged and counted; the remaining lines are still tried.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Persist`] if the file cannot be created,
    /// including when it already exists
    pub async fn write_tally(&self, tally: &FailureTally) -> HarnessResult<WrittenReport> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&self.path)
            .await
            .map_err(|e| HarnessError::persist(&self.path, e))?;

        let mut report = WrittenReport {
            path: self.path.clone(),
            lines_written: 0,
            lines_failed: 0,
        };

        for (title, count) in tally.entries() {
            let line = format_line(title, count);
            let appended = match file.write_all(line.as_bytes()).await {
                Ok(()) => file.flush().await,
                Err(e) => Err(e),
            };

            match appended {
                Ok(()) => report.lines_written += 1,
                Err(e) => {
                    warn!(path = %self.path.display(), title, error = %e, "failed to append report line");
                    report.lines_failed += 1;
                }
            }
        }

        debug!(path = %self.path.display(), lines = report.lines_written, "report written");
        Ok(report)
    }

    /// Read the file back into `(title, count)` entries
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a decode error for
    /// a malformed line
    pub async fn read(&self) -> HarnessResult<Vec<(String, u32)>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_report(&text)
    }
}

/// Parse report text into `(title, count)` entries, in file order
///
/// Titles may themselves contain `": "`, so each line splits on the last one.
///
/// # Errors
///
/// Returns [`HarnessError::Decode`] naming the first malformed line
pub fn parse_report(text: &str) -> HarnessResult<Vec<(String, u32)>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let (title, count) = line.rsplit_once(": ").ok_or_else(|| {
                HarnessError::decode(format!("line {}: missing ': ' separator", index + 1), line)
            })?;
            let count = count.trim().parse::<u32>().map_err(|e| {
                HarnessError::decode(format!("line {}: bad count: {e}", index + 1), line)
            })?;
            Ok((title.to_string(), count))
        })
        .collect()
}
