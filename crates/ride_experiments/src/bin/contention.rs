//! Run a grid of contention experiments and export the reports.
//!
//! Run with: cargo run -p ride_experiments --bin contention -- --drivers 2,8,32 --threads 4,8

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use ride_core::MatchingPolicyKind;
use ride_experiments::{
    export_to_csv, export_to_json, run_parallel_contention, ContentionParams, ContentionSpace,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    LowestDriverId,
    LongestIdle,
}

impl From<Policy> for MatchingPolicyKind {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::LowestDriverId => MatchingPolicyKind::LowestDriverId,
            Policy::LongestIdle => MatchingPolicyKind::LongestIdle,
        }
    }
}

#[derive(Parser)]
#[command(name = "contention", about = "Concurrent ride-matching contention experiments")]
struct Args {
    /// Rider counts to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [16])]
    riders: Vec<usize>,
    /// Driver counts to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [2, 8, 32])]
    drivers: Vec<usize>,
    /// Worker threads per run to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [4])]
    threads: Vec<usize>,
    /// Matching policies to sweep
    #[arg(long, value_enum, value_delimiter = ',', default_values = ["lowest-driver-id"])]
    policy: Vec<Policy>,
    /// Operations each worker thread performs
    #[arg(long, default_value_t = 2_000)]
    ops: usize,
    /// Base seed; run i uses seed + i
    #[arg(long, env = "CONTENTION_SEED", default_value_t = 42)]
    seed: u64,
    /// Runs executed in parallel (defaults to the number of CPUs)
    #[arg(long)]
    parallel: Option<usize>,
    /// Write full reports as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Write one summary row per run as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ride_experiments=info,ride_core=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let base = ContentionParams::default()
        .with_seed(args.seed)
        .with_ops_per_thread(args.ops);
    let runs = ContentionSpace::with_base(base)
        .riders(args.riders)
        .drivers(args.drivers)
        .threads(args.threads)
        .policies(args.policy.into_iter().map(Into::into).collect())
        .generate();

    let reports = match run_parallel_contention(runs, args.parallel, !args.quiet) {
        Ok(reports) => reports,
        Err(err) => {
            tracing::error!(error = %err, "contention runs failed");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{:>4} {:>7} {:>7} {:>7} {:>10} {:>9} {:>9} {:>10}",
        "run", "riders", "drivers", "threads", "ops/s", "matched", "conflicts", "violations"
    );
    for report in &reports {
        println!(
            "{:>4} {:>7} {:>7} {:>7} {:>10.0} {:>9} {:>9} {:>10}",
            report.params.run_id,
            report.params.riders,
            report.params.drivers,
            report.params.threads,
            report.ops_per_sec,
            report.outcomes.matched,
            report.outcomes.conflicts,
            report.violations.len()
        );
    }

    if let Some(path) = &args.json {
        if let Err(err) = export_to_json(&reports, path) {
            tracing::error!(error = %err, path = %path.display(), "JSON export failed");
            return ExitCode::FAILURE;
        }
    }
    if let Some(path) = &args.csv {
        if let Err(err) = export_to_csv(&reports, path) {
            tracing::error!(error = %err, path = %path.display(), "CSV export failed");
            return ExitCode::FAILURE;
        }
    }

    if reports.iter().any(|report| !report.violations.is_empty()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
