//! Loading tabular input files into untyped row grids.
//!
//! Delimited text goes through the `csv` crate and workbooks through
//! `calamine`; either way the result is the same grid of optional text
//! cells, with the first row split off as the header. Numeric
//! interpretation happens downstream, never here.

use calamine::{Data, Reader, open_workbook_auto};
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported input format '{extension}' for '{path}'")]
    UnsupportedFormat { path: String, extension: String },

    #[error("cannot parse '{path}' as delimited text: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("cannot open '{path}' as a workbook: {source}")]
    Workbook {
        path: String,
        source: calamine::Error,
    },

    #[error("'{path}' contains no worksheets")]
    NoSheets { path: String },

    #[error("'{path}' has no header row")]
    MissingHeader { path: String },
}

/// One input file loaded as untyped text cells. The header row is kept for
/// inspection but excluded from `rows`; blank cells are `None`.
#[derive(Debug, Default)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Looks up a data cell by zero-based row and column. Returns `None`
    /// for negative or out-of-range columns (the resolver maps letterless
    /// labels to -1) and for blank cells.
    pub fn cell(&self, row: usize, col: i64) -> Option<&str> {
        if col < 0 {
            return None;
        }
        self.rows.get(row)?.get(col as usize)?.as_deref()
    }
}

/// Loads a single input file, selecting the parser from its extension:
/// `.csv`/`.tsv`/`.txt` as delimited text, anything calamine understands
/// (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) as a workbook, first sheet
/// only.
pub fn ingest(path: &Path) -> Result<RawTable, IngestError> {
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" | "txt" => ingest_delimited(path, b',')?,
        "tsv" => ingest_delimited(path, b'\t')?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => ingest_workbook(path)?,
        _ => {
            return Err(IngestError::UnsupportedFormat {
                path: path.display().to_string(),
                extension,
            });
        }
    };

    debug!(
        path = %path.display(),
        columns = table.header.len(),
        rows = table.rows.len(),
        "File ingested"
    );
    Ok(table)
}

fn ingest_delimited(path: &Path, delimiter: u8) -> Result<RawTable, IngestError> {
    let csv_err = |source| IngestError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(csv_err)?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.map_err(csv_err)?.iter().map(str::to_string).collect(),
        None => {
            return Err(IngestError::MissingHeader {
                path: path.display().to_string(),
            });
        }
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(text_cell).collect());
    }

    Ok(RawTable { header, rows })
}

fn ingest_workbook(path: &Path) -> Result<RawTable, IngestError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| IngestError::Workbook {
        path: path.display().to_string(),
        source,
    })?;

    // Only the first sheet is read
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::NoSheets {
            path: path.display().to_string(),
        })?
        .map_err(|source| IngestError::Workbook {
            path: path.display().to_string(),
            source,
        })?;

    let mut row_iter = range.rows();
    let header = match row_iter.next() {
        Some(cells) => cells
            .iter()
            .map(|d| text_cell(&d.to_string()).unwrap_or_default())
            .collect(),
        None => {
            return Err(IngestError::MissingHeader {
                path: path.display().to_string(),
            });
        }
    };

    let rows = row_iter
        .map(|cells| cells.iter().map(data_cell).collect())
        .collect();

    Ok(RawTable { header, rows })
}

fn text_cell(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn data_cell(d: &Data) -> Option<String> {
    match d {
        Data::Empty => None,
        Data::String(s) => text_cell(s),
        other => Some(other.to_string()),
    }
}
