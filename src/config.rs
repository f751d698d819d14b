//! Run configuration: column selectors and distance-range parsing.
//!
//! Column letters and range lists arrive as free text from the front end,
//! so they are validated here before anything reaches the aggregation core.

use thiserror::Error;
use tracing::warn;

use crate::columns;
use crate::summarize::RangeSpec;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("column label '{0}' contains no letters")]
    BadColumn(String),

    #[error("range token '{0}' is not of the form min-max")]
    BadRangeToken(String),

    #[error("range {min}-{max} has min greater than max")]
    InvertedRange { min: f64, max: f64 },
}

/// A validated column selector: the normalized letter label (kept for
/// diagnostic cell references) and its resolved zero-based index.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub label: String,
    pub index: i64,
}

impl Column {
    /// Normalizes a user-supplied column letter and resolves its index.
    /// Labels without a single ASCII letter are rejected here, so the
    /// permissive resolver never sees them.
    pub fn parse(label: &str) -> Result<Self, ConfigError> {
        let normalized: String = label
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| c.is_ascii_uppercase())
            .collect();
        if normalized.is_empty() {
            return Err(ConfigError::BadColumn(label.to_string()));
        }
        let index = columns::resolve(&normalized);
        Ok(Column {
            label: normalized,
            index,
        })
    }
}

/// The four column selectors the aggregator needs.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub subject: Column,
    pub correct: Column,
    pub trial: Column,
    pub distance: Column,
}

impl ColumnMap {
    pub fn parse(
        subject: &str,
        correct: &str,
        trial: &str,
        distance: &str,
    ) -> Result<Self, ConfigError> {
        Ok(ColumnMap {
            subject: Column::parse(subject)?,
            correct: Column::parse(correct)?,
            trial: Column::parse(trial)?,
            distance: Column::parse(distance)?,
        })
    }
}

/// Parses a comma-separated list of `min-max` range tokens, e.g.
/// `"1-4,5-8,9-13"`. Invalid tokens are reported individually and do not
/// abort the valid ones; empty tokens are ignored.
pub fn parse_ranges(input: &str) -> (Vec<RangeSpec>, Vec<ConfigError>) {
    let mut ranges = Vec::new();
    let mut errors = Vec::new();

    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match parse_range_token(token) {
            Ok(range) => ranges.push(range),
            Err(e) => {
                warn!(token, error = %e, "Ignoring invalid range token");
                errors.push(e);
            }
        }
    }

    (ranges, errors)
}

fn parse_range_token(token: &str) -> Result<RangeSpec, ConfigError> {
    let bad = || ConfigError::BadRangeToken(token.to_string());

    let (min_text, max_text) = token.split_once('-').ok_or_else(bad)?;
    let min: f64 = min_text.trim().parse().map_err(|_| bad())?;
    let max: f64 = max_text.trim().parse().map_err(|_| bad())?;

    RangeSpec::new(min, max)
}
