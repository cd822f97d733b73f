//! Contention experiments for the ride core.
//!
//! Each run seeds a fresh in-memory engine with riders and drivers, then
//! hammers it from several threads with a seeded mix of ride requests,
//! matches, accepts, lifecycle moves and location reports. When the threads
//! finish the run audits the final state against the ride and availability
//! invariants and reports outcome counts alongside the engine telemetry.
//!
//! ```no_run
//! use ride_experiments::{run_parallel_contention, ContentionSpace};
//!
//! let runs = ContentionSpace::grid()
//!     .drivers(vec![2, 8, 32])
//!     .threads(vec![4, 8])
//!     .generate();
//! let reports = run_parallel_contention(runs, None, false).unwrap();
//! assert!(reports.iter().all(|report| report.violations.is_empty()));
//! ```
//!
//! - [`params`]: run parameters and grid generation
//! - [`runner`]: single and rayon-parallel execution
//! - [`audit`]: post-run invariant checks
//! - [`export`]: JSON and CSV output

pub mod audit;
pub mod export;
pub mod params;
pub mod runner;

pub use export::{export_to_csv, export_to_json, ExportError};
pub use params::{ContentionParams, ContentionSpace};
pub use runner::{run_contention, run_parallel_contention, ContentionReport, OutcomeCounts, RunnerError};
