//! Failure tally
//!
//! Per-title count of iterations in which a test was reported failed. A
//! title counts at most once per iteration, so no count can exceed the
//! number of iterations recorded.

use crate::report::FailureRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Accumulated failure counts across iterations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureTally {
    counts: BTreeMap<String, u32>,
    iterations: u32,
    tallied: u32,
}

impl FailureTally {
    /// Create an empty tally
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded iteration and return the distinct failing titles
    pub fn record_iteration(&mut self, failures: &[FailureRecord]) -> Vec<String> {
        self.iterations += 1;
        self.tallied += 1;

        let titles: BTreeSet<&str> = failures.iter().map(|f| f.title.as_str()).collect();
        for title in &titles {
            *self.counts.entry((*title).to_string()).or_insert(0) += 1;
        }
        titles.into_iter().map(str::to_string).collect()
    }

    /// Record an iteration that produced no usable report
    pub fn record_skipped(&mut self) {
        self.iterations += 1;
    }

    /// Failure count for `title` (zero when never seen)
    #[must_use]
    pub fn count(&self, title: &str) -> u32 {
        self.counts.get(title).copied().unwrap_or(0)
    }

    /// Iterations executed, including skipped ones
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Iterations whose report was decoded
    #[must_use]
    pub const fn tallied(&self) -> u32 {
        self.tallied
    }

    /// Iterations that contributed nothing
    #[must_use]
    pub const fn skipped(&self) -> u32 {
        self.iterations - self.tallied
    }

    /// Number of distinct failing titles
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no failure was ever recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    #[must_use]
    pub fn total_failures(&self) -> u64 {
        self.counts.values().map(|&c| u64::from(c)).sum()
    }

    /// Fraction of decoded iterations in which `title` failed
    #[must_use]
    pub fn failure_rate(&self, title: &str) -> f64 {
        if self.tallied == 0 {
            return 0.0;
        }
        f64::from(self.count(title)) / f64::from(self.tallied)
    }

    /// Entries ordered by descending count, ties by title
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, u32)> {
        let mut entries: Vec<(&str, u32)> = self
            .counts
            .iter()
            .map(|(title, &count)| (title.as_str(), count))
            .collect();
        // BTreeMap iteration is already title-ordered; a stable sort keeps that for ties.
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}
