//! Summary output: delimited text, workbooks, and JSON logging.
//!
//! CSV destinations are always a full overwrite; XLSX destinations can
//! either be overwritten or, in append mode, gain the summary as a new
//! timestamped sheet while existing sheets are carried over. Both writers
//! go through a temporary sibling file so a failed run never leaves a
//! half-written report behind.

use anyhow::Result;
use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::summarize::{RangeSpec, SummaryRow};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("unsupported output format '{extension}' for '{path}'")]
    UnsupportedFormat { path: String, extension: String },

    #[error("append mode needs an .xlsx destination, got '{path}'")]
    AppendUnsupported { path: String },

    #[error("cannot write '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write delimited text to '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("cannot write workbook '{path}': {source}")]
    Workbook {
        path: String,
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("cannot read existing workbook '{path}' for append: {source}")]
    WorkbookRead {
        path: String,
        source: calamine::XlsxError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    Overwrite,
    Append,
}

/// Column headers for the emitted table: subject id first, then a
/// percent-correct and a diagnostic column per range in configured order.
pub fn header_labels(ranges: &[RangeSpec]) -> Vec<String> {
    let mut labels = Vec::with_capacity(1 + ranges.len() * 2);
    labels.push("Animal ID".to_string());
    for range in ranges {
        labels.push(format!("%C {}", range.label()));
        labels.push(format!("Diag {}", range.label()));
    }
    labels
}

/// Writes the summary to `destination`, choosing the writer from the file
/// extension. Append mode is only meaningful for existing XLSX workbooks;
/// an append onto a missing workbook degrades to a plain write, and an
/// append onto any other format is an error.
pub fn emit(
    rows: &[SummaryRow],
    ranges: &[RangeSpec],
    destination: &Path,
    mode: EmitMode,
) -> Result<(), OutputError> {
    let extension = destination
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match (extension.as_str(), mode) {
        ("csv", EmitMode::Overwrite) => write_csv(rows, ranges, destination),
        ("xlsx", EmitMode::Overwrite) => write_xlsx(rows, ranges, destination, Vec::new()),
        ("xlsx", EmitMode::Append) => append_xlsx(rows, ranges, destination),
        (_, EmitMode::Append) => Err(OutputError::AppendUnsupported {
            path: destination.display().to_string(),
        }),
        _ => Err(OutputError::UnsupportedFormat {
            path: destination.display().to_string(),
            extension,
        }),
    }
}

/// Logs the summary rows using Rust's debug pretty-print format.
pub fn print_pretty(rows: &[SummaryRow]) {
    debug!("{:#?}", rows);
}

/// Logs the summary rows as pretty-printed JSON.
pub fn print_json(rows: &[SummaryRow]) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

fn temp_sibling(destination: &Path, extension: &str) -> PathBuf {
    destination.with_extension(format!("{extension}.tmp"))
}

fn write_csv(rows: &[SummaryRow], ranges: &[RangeSpec], destination: &Path) -> Result<(), OutputError> {
    let tmp = temp_sibling(destination, "csv");

    if let Err(e) = write_csv_to(rows, ranges, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, destination).map_err(|source| OutputError::Io {
        path: destination.display().to_string(),
        source,
    })
}

fn write_csv_to(rows: &[SummaryRow], ranges: &[RangeSpec], path: &Path) -> Result<(), OutputError> {
    let csv_err = |source| OutputError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(header_labels(ranges)).map_err(csv_err)?;

    for row in rows {
        let mut record = Vec::with_capacity(1 + row.ranges.len() * 2);
        record.push(row.subject_id.clone());
        for summary in &row.ranges {
            // {:?} keeps the .0 on whole percentages, matching numeric cells
            record.push(format!("{:?}", summary.percent_correct));
            record.push(summary.diagnostic.clone());
        }
        writer.write_record(&record).map_err(csv_err)?;
    }

    writer.flush().map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source: source.into(),
    })?;
    Ok(())
}

fn write_xlsx(
    rows: &[SummaryRow],
    ranges: &[RangeSpec],
    destination: &Path,
    carried: Vec<(String, Vec<Vec<Data>>)>,
) -> Result<(), OutputError> {
    let workbook_err = |source| OutputError::Workbook {
        path: destination.display().to_string(),
        source,
    };

    let summary_name = if carried.is_empty() {
        "Summary".to_string()
    } else {
        timestamp_sheet_name(&carried, Local::now())
    };

    let mut workbook = Workbook::new();

    for (name, grid) in &carried {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name.as_str()).map_err(workbook_err)?;
        for (r, cells) in grid.iter().enumerate() {
            for (c, data) in cells.iter().enumerate() {
                copy_cell(sheet, r as u32, c as u16, data).map_err(workbook_err)?;
            }
        }
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name(summary_name.as_str()).map_err(workbook_err)?;

    for (c, label) in header_labels(ranges).iter().enumerate() {
        sheet
            .write_string(0, c as u16, label.as_str())
            .map_err(workbook_err)?;
    }
    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        sheet
            .write_string(r, 0, row.subject_id.as_str())
            .map_err(workbook_err)?;
        for (i, summary) in row.ranges.iter().enumerate() {
            let c = (1 + i * 2) as u16;
            sheet
                .write_number(r, c, summary.percent_correct)
                .map_err(workbook_err)?;
            sheet
                .write_string(r, c + 1, summary.diagnostic.as_str())
                .map_err(workbook_err)?;
        }
    }

    let tmp = temp_sibling(destination, "xlsx");
    if let Err(source) = workbook.save(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(workbook_err(source));
    }

    debug!(path = %destination.display(), sheet = %summary_name, "Workbook written");
    fs::rename(&tmp, destination).map_err(|source| OutputError::Io {
        path: destination.display().to_string(),
        source,
    })
}

/// Appends the summary as a new timestamped sheet. The existing workbook is
/// read back cell by cell and rewritten alongside the new sheet; values
/// survive the round trip, formatting does not.
fn append_xlsx(rows: &[SummaryRow], ranges: &[RangeSpec], destination: &Path) -> Result<(), OutputError> {
    if !destination.exists() {
        return write_xlsx(rows, ranges, destination, Vec::new());
    }

    let read_err = |source| OutputError::WorkbookRead {
        path: destination.display().to_string(),
        source,
    };

    let mut existing: Xlsx<_> = open_workbook(destination).map_err(read_err)?;
    let names = existing.sheet_names().to_owned();

    let mut carried = Vec::with_capacity(names.len());
    for name in names {
        let range = existing.worksheet_range(&name).map_err(read_err)?;
        let grid = range.rows().map(|cells| cells.to_vec()).collect();
        carried.push((name, grid));
    }

    write_xlsx(rows, ranges, destination, carried)
}

/// Sheet names for append mode: second-resolution local timestamp, with a
/// numeric suffix when two appends land in the same second.
fn timestamp_sheet_name(carried: &[(String, Vec<Vec<Data>>)], now: DateTime<Local>) -> String {
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let mut name = stamp.clone();
    let mut n = 2;
    while carried.iter().any(|(existing, _)| *existing == name) {
        name = format!("{stamp}_{n}");
        n += 1;
    }
    name
}

fn copy_cell<'a>(
    sheet: &'a mut Worksheet,
    row: u32,
    col: u16,
    data: &Data,
) -> Result<&'a mut Worksheet, rust_xlsxwriter::XlsxError> {
    match data {
        Data::Empty => Ok(sheet),
        Data::Int(i) => sheet.write_number(row, col, *i as f64),
        Data::Float(f) => sheet.write_number(row, col, *f),
        Data::Bool(b) => sheet.write_boolean(row, col, *b),
        other => sheet.write_string(row, col, other.to_string()),
    }
}
