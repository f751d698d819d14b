pub mod aggregate;
pub mod columns;
pub mod config;
pub mod ingest;
pub mod report;
pub mod summarize;
