//! CLI entry point for the maze rater tool.
//!
//! Provides subcommands for aggregating trial spreadsheets into a
//! per-subject summary and for inspecting a single input file.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use maze_rater::{
    aggregate::aggregate,
    config::{ColumnMap, parse_ranges},
    ingest::ingest,
    report::{EmitMode, emit, print_json, print_pretty},
    summarize::summarize,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "maze_rater")]
#[command(about = "Summarizes rat maze trial spreadsheets by distance range", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate trial files into a per-subject summary
    Analyze {
        /// Input CSV or Excel files, scanned in the order given
        #[arg(value_name = "FILES", required = true)]
        files: Vec<String>,

        /// Destination file (.csv or .xlsx)
        #[arg(short, long, default_value = "summary.xlsx")]
        output: String,

        /// Add the summary as a new timestamped sheet when the destination
        /// workbook already exists
        #[arg(long, default_value_t = false)]
        append: bool,

        /// Animal ID column letter
        #[arg(long, default_value = "J")]
        animal_col: String,

        /// Correct-count column letter
        #[arg(long, default_value = "AP")]
        correct_col: String,

        /// Trial number column letter
        #[arg(long, default_value = "AQ")]
        trial_col: String,

        /// Distance column letter
        #[arg(long, default_value = "AR")]
        distance_col: String,

        /// Distance ranges as comma-separated min-max pairs
        #[arg(long, default_value = "1-4,5-8,9-13")]
        ranges: String,

        /// Also log the summary as pretty JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the header and row count of a single input file
    Inspect {
        /// Path to a CSV or Excel file
        #[arg(value_name = "FILE")]
        file: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/maze_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("maze_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            files,
            output,
            append,
            animal_col,
            correct_col,
            trial_col,
            distance_col,
            ranges,
            json,
        } => run_analyze(
            &files,
            &output,
            append,
            &animal_col,
            &correct_col,
            &trial_col,
            &distance_col,
            &ranges,
            json,
        ),
        Commands::Inspect { file } => run_inspect(&file),
    }
}

/// Runs the whole pipeline: ingest every input, aggregate, summarize,
/// then write the summary to the destination.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip_all, fields(output = %output, files = files.len()))]
fn run_analyze(
    files: &[String],
    output: &str,
    append: bool,
    animal_col: &str,
    correct_col: &str,
    trial_col: &str,
    distance_col: &str,
    range_arg: &str,
    json: bool,
) -> Result<()> {
    let columns = ColumnMap::parse(animal_col, correct_col, trial_col, distance_col)?;

    let (ranges, range_errors) = parse_ranges(range_arg);
    if !range_errors.is_empty() {
        warn!(
            rejected = range_errors.len(),
            accepted = ranges.len(),
            "Some range tokens were invalid"
        );
    }
    if ranges.is_empty() {
        bail!("no valid distance ranges configured");
    }

    let mut tables = Vec::with_capacity(files.len());
    for file in files {
        let table = ingest(Path::new(file))?;
        info!(file = %file, rows = table.rows.len(), "File ingested");
        tables.push((file.clone(), table));
    }

    let (ledger, counts) = aggregate(&tables, &columns);
    for c in &counts {
        info!(
            file = %c.file,
            rows = c.rows,
            recorded = c.recorded,
            missing_key = c.missing_key,
            duplicate_trial = c.duplicate_trial,
            bad_number = c.bad_number,
            "File aggregated"
        );
    }

    let rows = summarize(&ledger, &ranges);
    info!(subjects = rows.len(), ranges = ranges.len(), "Summary computed");
    print_pretty(&rows);

    if json {
        print_json(&rows)?;
    }

    let mode = if append {
        EmitMode::Append
    } else {
        EmitMode::Overwrite
    };
    emit(&rows, &ranges, Path::new(output), mode)?;
    info!(output = %output, "Summary written");

    Ok(())
}

/// Logs the header and dimensions of one input file.
#[tracing::instrument(fields(file = %file))]
fn run_inspect(file: &str) -> Result<()> {
    let table = ingest(Path::new(file))?;

    info!(
        columns = table.header.len(),
        rows = table.rows.len(),
        header = ?table.header,
        "File inspected"
    );

    Ok(())
}
