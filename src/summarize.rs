//! Range-bucketed statistics over the subject ledger.

use serde::Serialize;

use crate::aggregate::{SubjectLedger, TrialRecord};
use crate::config::ConfigError;

/// A closed distance interval; both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
}

impl RangeSpec {
    pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvertedRange { min, max });
        }
        Ok(RangeSpec { min, max })
    }

    pub fn contains(&self, distance: f64) -> bool {
        self.min <= distance && distance <= self.max
    }

    /// Compact bounds for report headers: trailing zeros trimmed, so
    /// `1-4` rather than `1.0-4.0`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.min, self.max)
    }
}

/// Statistics for one subject within one range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSummary {
    pub percent_correct: f64,
    pub diagnostic: String,
}

/// One output row: a subject and its per-range statistics, in the
/// configured range order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub subject_id: String,
    pub ranges: Vec<RangeSummary>,
}

/// Computes per-subject, per-range statistics from the ledger. Rows come
/// out sorted by subject id (plain string order) and trials are selected
/// in ledger insertion order, which keeps diagnostic traces reproducible.
pub fn summarize(ledger: &SubjectLedger, ranges: &[RangeSpec]) -> Vec<SummaryRow> {
    let mut rows = Vec::with_capacity(ledger.subject_count());

    for (subject_id, trials) in ledger.subjects() {
        let summaries = ranges
            .iter()
            .map(|range| summarize_range(trials, range))
            .collect();
        rows.push(SummaryRow {
            subject_id: subject_id.to_string(),
            ranges: summaries,
        });
    }

    rows
}

fn summarize_range(trials: &[TrialRecord], range: &RangeSpec) -> RangeSummary {
    let selected: Vec<&TrialRecord> = trials
        .iter()
        .filter(|t| range.contains(t.distance))
        .collect();

    let count = selected.len();
    let total: i64 = selected.iter().map(|t| t.correct).sum();

    // Empty buckets report exactly 0.0 so downstream sheets stay numeric
    let percent_correct = if count > 0 {
        total as f64 / count as f64 * 100.0
    } else {
        0.0
    };

    let coords: Vec<String> = selected
        .iter()
        .map(|t| format!("[{},{}]", t.correct_ref, t.distance_ref))
        .collect();

    RangeSummary {
        percent_correct,
        diagnostic: format!("{},{},{}", total, count, coords.join(";")),
    }
}
