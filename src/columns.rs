//! Spreadsheet column-letter arithmetic.

/// Resolves a spreadsheet column label to a zero-based column index.
///
/// Letters are read as base-26 digits valued 1–26, so `"A"` is 0, `"Z"` is
/// 25, `"AA"` is 26 and `"AP"` is 41. Matching is case-insensitive and any
/// character outside A–Z is skipped rather than rejected. A label with no
/// letters at all resolves to -1, which row access treats as out of range.
pub fn resolve(label: &str) -> i64 {
    let mut idx: i64 = 0;
    for c in label.chars() {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_uppercase() {
            idx = idx * 26 + (c as i64 - 'A' as i64 + 1);
        }
    }
    idx - 1
}

/// Formats a cell reference for diagnostics, e.g. `cell_ref("AP", 2)` is
/// `"AP2"`. Row numbers are 1-based spreadsheet rows; the first data row of
/// an ingested table is row 2 because the header occupies row 1.
pub fn cell_ref(label: &str, row: usize) -> String {
    format!("{}{}", label.to_ascii_uppercase(), row)
}
