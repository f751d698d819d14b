//! Trial record aggregation with first-wins deduplication.
//!
//! Every row of every ingested table is classified into an explicit
//! [`RowOutcome`]: either it becomes a new [`TrialRecord`] in the ledger or
//! it is skipped for a named reason. Skips are part of normal operation
//! (sparse and ragged spreadsheets are expected) and are counted per file
//! rather than raised as errors.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::columns::cell_ref;
use crate::config::ColumnMap;
use crate::ingest::RawTable;

/// One deduplicated trial for a subject. Immutable once recorded; the cell
/// references point at the source cells the numbers came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub trial_id: String,
    pub distance: f64,
    pub correct: i64,
    pub correct_ref: String,
    pub distance_ref: String,
}

/// Why a row was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Subject or trial cell blank or out of range.
    MissingKey,
    /// The (subject, trial) pair was already recorded; first occurrence wins.
    DuplicateTrial,
    /// Distance or correct-count cell did not parse as a number.
    BadNumber,
}

#[derive(Debug, PartialEq)]
pub enum RowOutcome {
    Recorded,
    Skipped(SkipReason),
}

/// All trials recorded for one subject, in insertion order. Insertion order
/// is what makes diagnostic traces reproducible between runs.
#[derive(Debug, Default)]
pub struct SubjectTrials {
    seen: HashSet<String>,
    records: Vec<TrialRecord>,
}

impl SubjectTrials {
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }
}

/// The per-run ledger: subject id to recorded trials. Subjects iterate in
/// plain string order, trials in first-insertion order. Built fresh for
/// every run and owned exclusively by the aggregation call.
#[derive(Debug, Default)]
pub struct SubjectLedger {
    subjects: BTreeMap<String, SubjectTrials>,
}

impl SubjectLedger {
    pub fn contains(&self, subject: &str, trial: &str) -> bool {
        self.subjects
            .get(subject)
            .is_some_and(|t| t.seen.contains(trial))
    }

    fn insert(&mut self, subject: &str, record: TrialRecord) {
        let trials = self.subjects.entry(subject.to_string()).or_default();
        trials.seen.insert(record.trial_id.clone());
        trials.records.push(record);
    }

    pub fn subjects(&self) -> impl Iterator<Item = (&str, &[TrialRecord])> {
        self.subjects
            .iter()
            .map(|(id, trials)| (id.as_str(), trials.records()))
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Row counts for one input file, reported after aggregation so dropped
/// data is visible instead of silently lost.
#[derive(Debug, Serialize)]
pub struct FileCounts {
    pub file: String,
    pub rows: usize,
    pub recorded: usize,
    pub missing_key: usize,
    pub duplicate_trial: usize,
    pub bad_number: usize,
}

impl FileCounts {
    fn new(file: &str) -> Self {
        FileCounts {
            file: file.to_string(),
            rows: 0,
            recorded: 0,
            missing_key: 0,
            duplicate_trial: 0,
            bad_number: 0,
        }
    }

    fn tally(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingKey => self.missing_key += 1,
            SkipReason::DuplicateTrial => self.duplicate_trial += 1,
            SkipReason::BadNumber => self.bad_number += 1,
        }
    }
}

/// Builds a [`SubjectLedger`] from the given tables. Files are scanned in
/// the order supplied and rows in source order; that order decides which
/// occurrence of a (subject, trial) pair wins. An empty input set yields an
/// empty ledger, not an error.
pub fn aggregate(tables: &[(String, RawTable)], columns: &ColumnMap) -> (SubjectLedger, Vec<FileCounts>) {
    let mut ledger = SubjectLedger::default();
    let mut counts = Vec::with_capacity(tables.len());

    for (file, table) in tables {
        let mut file_counts = FileCounts::new(file);

        for row in 0..table.rows.len() {
            file_counts.rows += 1;
            match absorb_row(&mut ledger, table, row, columns) {
                RowOutcome::Recorded => file_counts.recorded += 1,
                RowOutcome::Skipped(reason) => {
                    // Header sits at row 1, so the first data row is row 2
                    debug!(file = %file, row = row + 2, reason = ?reason, "Row skipped");
                    file_counts.tally(reason);
                }
            }
        }

        counts.push(file_counts);
    }

    (ledger, counts)
}

fn absorb_row(
    ledger: &mut SubjectLedger,
    table: &RawTable,
    row: usize,
    columns: &ColumnMap,
) -> RowOutcome {
    let Some(subject) = table.cell(row, columns.subject.index) else {
        return RowOutcome::Skipped(SkipReason::MissingKey);
    };
    let Some(trial) = table.cell(row, columns.trial.index) else {
        return RowOutcome::Skipped(SkipReason::MissingKey);
    };

    if ledger.contains(subject, trial) {
        return RowOutcome::Skipped(SkipReason::DuplicateTrial);
    }

    let Some(distance) = table.cell(row, columns.distance.index).and_then(parse_distance) else {
        return RowOutcome::Skipped(SkipReason::BadNumber);
    };
    let Some(correct) = table.cell(row, columns.correct.index).and_then(parse_correct) else {
        return RowOutcome::Skipped(SkipReason::BadNumber);
    };

    let sheet_row = row + 2;
    let record = TrialRecord {
        trial_id: trial.to_string(),
        distance,
        correct,
        correct_ref: cell_ref(&columns.correct.label, sheet_row),
        distance_ref: cell_ref(&columns.distance.label, sheet_row),
    };

    let subject = subject.to_string();
    ledger.insert(&subject, record);
    RowOutcome::Recorded
}

fn parse_distance(s: &str) -> Option<f64> {
    s.trim().parse().ok()
}

/// Correct counts arrive as integers or as float-shaped text like "3.0";
/// fractional values are truncated toward zero.
fn parse_correct(s: &str) -> Option<i64> {
    let value: f64 = s.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value as i64)
}
