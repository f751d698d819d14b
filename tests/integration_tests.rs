use maze_rater::aggregate::aggregate;
use maze_rater::config::{ColumnMap, parse_ranges};
use maze_rater::ingest::ingest;
use maze_rater::report::{EmitMode, emit};
use maze_rater::summarize::summarize;

use std::fs;
use std::path::{Path, PathBuf};

/// Default column layout: Animal ID at J (9), correct at AP (41),
/// trial at AQ (42), distance at AR (43).
const ROW_WIDTH: usize = 44;

fn default_columns() -> ColumnMap {
    ColumnMap::parse("J", "AP", "AQ", "AR").unwrap()
}

fn csv_line(subject: &str, correct: &str, trial: &str, distance: &str) -> String {
    let mut cells = vec![String::new(); ROW_WIDTH];
    cells[9] = subject.to_string();
    cells[41] = correct.to_string();
    cells[42] = trial.to_string();
    cells[43] = distance.to_string();
    cells.join(",")
}

fn header_line() -> String {
    (0..ROW_WIDTH)
        .map(|i| format!("c{i}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_input(dir: &Path, name: &str, data_lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = header_line();
    for line in data_lines {
        content.push('\n');
        content.push_str(line);
    }
    content.push('\n');
    fs::write(&path, content).unwrap();
    path
}

fn run_pipeline(files: &[PathBuf], range_arg: &str) -> Vec<maze_rater::summarize::SummaryRow> {
    let columns = default_columns();
    let (ranges, errors) = parse_ranges(range_arg);
    assert!(errors.is_empty());

    let tables: Vec<_> = files
        .iter()
        .map(|f| (f.display().to_string(), ingest(f).unwrap()))
        .collect();
    let (ledger, _) = aggregate(&tables, &columns);
    summarize(&ledger, &ranges)
}

#[test]
fn test_full_pipeline_with_default_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "trials.csv",
        &[csv_line("R1", "3", "1", "2")],
    );

    let rows = run_pipeline(&[input], "1-4,5-8");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subject_id, "R1");
    assert_eq!(rows[0].ranges[0].percent_correct, 300.0);
    assert_eq!(rows[0].ranges[0].diagnostic, "3,1,[AP2,AR2]");
    assert_eq!(rows[0].ranges[1].percent_correct, 0.0);
    assert_eq!(rows[0].ranges[1].diagnostic, "0,0,");
}

#[test]
fn test_duplicate_trial_across_files_keeps_first_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_input(
        dir.path(),
        "first.csv",
        &[csv_line("R1", "3", "1", "2")],
    );
    let second = write_input(
        dir.path(),
        "second.csv",
        &[csv_line("R1", "9", "1", "12")],
    );

    let rows = run_pipeline(&[first.clone(), second.clone()], "1-4,9-13");

    // The first file's record wins; the contradicting one is dropped
    assert_eq!(rows[0].ranges[0].diagnostic, "3,1,[AP2,AR2]");
    assert_eq!(rows[0].ranges[1].diagnostic, "0,0,");

    // Reversing the file order flips the winner
    let rows = run_pipeline(&[second, first], "1-4,9-13");
    assert_eq!(rows[0].ranges[0].diagnostic, "0,0,");
    assert_eq!(rows[0].ranges[1].diagnostic, "9,1,[AP2,AR2]");
}

#[test]
fn test_blank_keys_never_reach_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "trials.csv",
        &[
            csv_line("", "3", "1", "2"),
            csv_line("R1", "3", "", "2"),
            csv_line("R1", "2", "1", "2"),
        ],
    );

    let rows = run_pipeline(&[input], "1-4");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ranges[0].diagnostic, "2,1,[AP4,AR4]");
}

#[test]
fn test_runs_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "trials.csv",
        &[
            csv_line("R2", "3", "1", "2"),
            csv_line("R1", "1", "1", "6"),
            csv_line("R1", "4", "2", "3"),
        ],
    );

    let first = run_pipeline(&[input.clone()], "1-4,5-8,9-13");
    let second = run_pipeline(&[input], "1-4,5-8,9-13");

    assert_eq!(first, second);
}

#[test]
fn test_csv_export_layout() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "trials.csv",
        &[csv_line("R1", "3", "1", "2")],
    );

    let rows = run_pipeline(&[input], "1-4,5-8");
    let (ranges, _) = parse_ranges("1-4,5-8");

    let out = dir.path().join("summary.csv");
    emit(&rows, &ranges, &out, EmitMode::Overwrite).unwrap();

    let mut reader = csv::Reader::from_path(&out).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        headers,
        vec!["Animal ID", "%C 1-4", "Diag 1-4", "%C 5-8", "Diag 5-8"]
    );

    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(&record[0], "R1");
    assert_eq!(&record[1], "300.0");
    assert_eq!(&record[2], "3,1,[AP2,AR2]");
}

#[test]
fn test_xlsx_export_reads_back_through_ingest() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "trials.csv",
        &[csv_line("R1", "3", "1", "2"), csv_line("R2", "1", "1", "7")],
    );

    let rows = run_pipeline(&[input], "1-4,5-8");
    let (ranges, _) = parse_ranges("1-4,5-8");

    let out = dir.path().join("summary.xlsx");
    emit(&rows, &ranges, &out, EmitMode::Overwrite).unwrap();

    // The emitted workbook is itself a valid single-sheet input
    let table = ingest(&out).unwrap();
    assert_eq!(
        table.header,
        vec!["Animal ID", "%C 1-4", "Diag 1-4", "%C 5-8", "Diag 5-8"]
    );
    assert_eq!(table.cell(0, 0), Some("R1"));
    assert_eq!(table.cell(0, 1), Some("300"));
    assert_eq!(table.cell(0, 2), Some("3,1,[AP2,AR2]"));
    assert_eq!(table.cell(1, 0), Some("R2"));
    assert_eq!(table.cell(1, 3), Some("100"));
}

#[test]
fn test_xlsx_append_preserves_previous_summary() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "trials.csv",
        &[csv_line("R1", "3", "1", "2")],
    );

    let rows = run_pipeline(&[input], "1-4");
    let (ranges, _) = parse_ranges("1-4");

    let out = dir.path().join("summary.xlsx");
    emit(&rows, &ranges, &out, EmitMode::Overwrite).unwrap();
    emit(&rows, &ranges, &out, EmitMode::Append).unwrap();

    use calamine::{Reader, Xlsx, open_workbook};
    let mut workbook: Xlsx<_> = open_workbook(&out).unwrap();
    let names = workbook.sheet_names().to_owned();
    assert_eq!(names.len(), 2);
    assert_eq!(names[0], "Summary");

    for name in names {
        let range = workbook.worksheet_range(&name).unwrap();
        assert_eq!(
            range.get_value((1, 0)),
            Some(&calamine::Data::String("R1".into()))
        );
    }
}
