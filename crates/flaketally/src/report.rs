//! Structured test report decoding
//!
//! Test runners emit a machine-readable report on stdout. Only the failures
//! matter here: each decoded [`FailureRecord`] carries the fully-qualified
//! test title that the tally is keyed by.

use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One failed test pulled from a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Fully-qualified test title
    pub title: String,
    /// Error message reported by the runner, if any
    pub error: Option<String>,
}

impl FailureRecord {
    /// Create a record without an error message
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            error: None,
        }
    }

    /// Attach an error message
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Structured report formats understood by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Mocha's `--reporter json` document
    #[default]
    Mocha,
    /// libtest `--format json` event stream
    Libtest,
}

impl ReportFormat {
    /// Decode the failures listed in captured stdout
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Decode`] carrying the raw text when the output
    /// is not a report in this format
    pub fn decode(self, stdout: &str) -> HarnessResult<Vec<FailureRecord>> {
        match self {
            Self::Mocha => decode_mocha(stdout),
            Self::Libtest => decode_libtest(stdout),
        }
    }

    /// Format name as accepted on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mocha => "mocha",
            Self::Libtest => "libtest",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mocha" => Ok(Self::Mocha),
            "libtest" => Ok(Self::Libtest),
            other => Err(HarnessError::invalid_config(format!(
                "unknown report format '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MochaReport {
    failures: Vec<MochaFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MochaFailure {
    full_title: String,
    #[serde(default)]
    err: serde_json::Value,
}

impl From<MochaFailure> for FailureRecord {
    fn from(failure: MochaFailure) -> Self {
        let error = match failure.err {
            serde_json::Value::Null => None,
            serde_json::Value::Object(ref map) if map.is_empty() => None,
            serde_json::Value::Object(ref map) => Some(
                map.get("message")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| failure.err.to_string(), str::to_string),
            ),
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        };
        Self {
            title: failure.full_title,
            error,
        }
    }
}

fn decode_mocha(stdout: &str) -> HarnessResult<Vec<FailureRecord>> {
    let report = match serde_json::from_str::<MochaReport>(stdout) {
        Ok(report) => report,
        Err(err) => embedded_report(stdout)
            .ok_or_else(|| HarnessError::decode(err.to_string(), stdout))?,
    };
    Ok(report.failures.into_iter().map(Into::into).collect())
}

/// First mocha document that starts at one of the `{` in `text`
///
/// npm scripts, runner banners and `console.log` calls can print around the
/// JSON document, braces included. Trailing text after the document is ignored.
fn embedded_report(text: &str) -> Option<MochaReport> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<MochaReport>()
            .next()?
            .ok()
    })
}

#[derive(Debug, Deserialize)]
struct LibtestEvent {
    #[serde(rename = "type")]
    kind: String,
    event: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    stdout: Option<String>,
}

fn decode_libtest(stdout: &str) -> HarnessResult<Vec<FailureRecord>> {
    let mut saw_event = false;
    let mut failures = Vec::new();

    for line in stdout.lines().map(str::trim) {
        if !line.starts_with('{') {
            continue;
        }
        let Ok(event) = serde_json::from_str::<LibtestEvent>(line) else {
            continue;
        };
        saw_event = true;
        if event.kind == "test" && event.event == "failed" {
            if let Some(name) = event.name {
                let record = FailureRecord::new(name);
                failures.push(match event.stdout {
                    Some(out) if !out.is_empty() => record.with_error(out),
                    _ => record,
                });
            }
        }
    }

    if saw_event {
        Ok(failures)
    } else {
        Err(HarnessError::decode("no libtest JSON events found", stdout))
    }
}
