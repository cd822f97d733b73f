//! Report export to JSON (full detail) and CSV (one flat row per run).

use std::fs::File;
use std::path::Path;

use ride_core::MatchingPolicyKind;
use serde::Serialize;
use thiserror::Error;

use crate::runner::ContentionReport;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no reports to export")]
    Empty,
    #[error("failed to create output file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

pub fn export_to_json(
    reports: &[ContentionReport],
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let file = create_output_file(reports, path)?;
    serde_json::to_writer_pretty(file, reports)?;
    Ok(())
}

#[derive(Serialize)]
struct CsvRow {
    run_id: usize,
    seed: u64,
    riders: usize,
    drivers: usize,
    threads: usize,
    ops_per_thread: usize,
    policy: MatchingPolicyKind,
    operations: u64,
    rides_created: u64,
    matched: u64,
    accepted: u64,
    conflicts: u64,
    no_match: u64,
    driver_unavailable: u64,
    match_success_rate: f64,
    violations: usize,
    elapsed_ms: f64,
    ops_per_sec: f64,
}

pub fn export_to_csv(
    reports: &[ContentionReport],
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let file = create_output_file(reports, path)?;
    let mut writer = csv::Writer::from_writer(file);
    for report in reports {
        writer.serialize(CsvRow {
            run_id: report.params.run_id,
            seed: report.params.seed,
            riders: report.params.riders,
            drivers: report.params.drivers,
            threads: report.params.threads,
            ops_per_thread: report.params.ops_per_thread,
            policy: report.params.policy,
            operations: report.outcomes.operations,
            rides_created: report.outcomes.rides_created,
            matched: report.outcomes.matched,
            accepted: report.outcomes.accepted,
            conflicts: report.outcomes.conflicts,
            no_match: report.outcomes.no_match,
            driver_unavailable: report.outcomes.driver_unavailable,
            match_success_rate: report.telemetry.match_success_rate(),
            violations: report.violations.len(),
            elapsed_ms: report.elapsed_ms,
            ops_per_sec: report.ops_per_sec,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn create_output_file(
    reports: &[ContentionReport],
    path: impl AsRef<Path>,
) -> Result<File, ExportError> {
    if reports.is_empty() {
        return Err(ExportError::Empty);
    }
    Ok(File::create(path)?)
}
