//! Contention runs: one engine, many threads, seeded operation mix.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use ride_core::config::{ConfigError, EngineConfig, GeocodeProviderKind};
use ride_core::identity::RegistrationError;
use ride_core::{
    GeoPoint, InMemoryIdentityRegistry, RideEngine, RideError, RideId, RideStatus, Role,
    TelemetrySnapshot, UserId,
};
use serde::Serialize;
use thiserror::Error;

use crate::audit::audit;
use crate::params::ContentionParams;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid run parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to register user: {0}")]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Engine(#[from] RideError),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// What the operations of a run came back with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OutcomeCounts {
    pub operations: u64,
    pub rides_created: u64,
    pub matched: u64,
    pub accepted: u64,
    pub transitions: u64,
    pub location_updates: u64,
    pub no_match: u64,
    pub conflicts: u64,
    pub driver_unavailable: u64,
    pub unauthorized: u64,
    pub invalid_transitions: u64,
    pub invalid_locations: u64,
    pub invalid_state: u64,
    pub other_errors: u64,
}

impl OutcomeCounts {
    fn record<T>(&mut self, result: &Result<T, RideError>, success: fn(&mut Self)) {
        self.operations += 1;
        match result {
            Ok(_) => success(self),
            Err(RideError::NoMatch { .. }) => self.no_match += 1,
            Err(RideError::Conflict { .. }) => self.conflicts += 1,
            Err(RideError::DriverUnavailable { .. }) => self.driver_unavailable += 1,
            Err(RideError::Unauthorized { .. }) => self.unauthorized += 1,
            Err(RideError::InvalidTransition { .. }) => self.invalid_transitions += 1,
            Err(RideError::InvalidLocation(_)) => self.invalid_locations += 1,
            Err(RideError::InvalidState { .. }) => self.invalid_state += 1,
            Err(_) => self.other_errors += 1,
        }
    }

    fn merge(&mut self, other: &OutcomeCounts) {
        self.operations += other.operations;
        self.rides_created += other.rides_created;
        self.matched += other.matched;
        self.accepted += other.accepted;
        self.transitions += other.transitions;
        self.location_updates += other.location_updates;
        self.no_match += other.no_match;
        self.conflicts += other.conflicts;
        self.driver_unavailable += other.driver_unavailable;
        self.unauthorized += other.unauthorized;
        self.invalid_transitions += other.invalid_transitions;
        self.invalid_locations += other.invalid_locations;
        self.invalid_state += other.invalid_state;
        self.other_errors += other.other_errors;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentionReport {
    pub params: ContentionParams,
    pub outcomes: OutcomeCounts,
    pub telemetry: TelemetrySnapshot,
    /// Final ride count per status code.
    pub final_statuses: BTreeMap<String, usize>,
    /// Invariants broken by the final state; empty for a sound run.
    pub violations: Vec<String>,
    pub elapsed_ms: f64,
    pub ops_per_sec: f64,
}

struct Cast {
    riders: Vec<UserId>,
    drivers: Vec<UserId>,
}

/// Run one contention experiment to completion and audit the result.
pub fn run_contention(params: &ContentionParams) -> Result<ContentionReport, RunnerError> {
    if params.riders == 0 || params.threads == 0 {
        return Err(RunnerError::InvalidParams(
            "riders and threads must be positive".to_string(),
        ));
    }

    let config = EngineConfig::default()
        .with_matching_policy(params.policy)
        .with_geocode_provider(GeocodeProviderKind::Disabled);
    let (engine, registry) = RideEngine::in_memory(&config)?;
    let cast = register_cast(&engine, &registry, params)?;
    let rides: Mutex<Vec<RideId>> = Mutex::new(Vec::new());

    let started = Instant::now();
    let per_thread = thread::scope(|scope| {
        let handles: Vec<_> = (0..params.threads)
            .map(|index| {
                let mut rng = StdRng::seed_from_u64(params.thread_seed(index));
                let (engine, registry, cast, rides) = (&engine, &registry, &cast, &rides);
                scope.spawn(move || {
                    let mut counts = OutcomeCounts::default();
                    for _ in 0..params.ops_per_thread {
                        step(engine, registry, cast, rides, &mut rng, &mut counts);
                    }
                    counts
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| RunnerError::WorkerPanicked))
            .collect::<Result<Vec<_>, _>>()
    })?;
    let elapsed = started.elapsed();

    let mut outcomes = OutcomeCounts::default();
    for counts in &per_thread {
        outcomes.merge(counts);
    }

    let mut final_statuses = BTreeMap::new();
    for ride in engine.list_rides() {
        *final_statuses
            .entry(ride.status.as_code().to_string())
            .or_insert(0) += 1;
    }

    let violations = audit(&engine, registry.as_ref());
    if !violations.is_empty() {
        tracing::error!(run = params.run_id, count = violations.len(), "invariant violations");
    }

    let elapsed_ms = elapsed.as_secs_f64() * 1_000.0;
    let ops_per_sec = if elapsed.as_secs_f64() > 0.0 {
        outcomes.operations as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    tracing::info!(
        run = params.run_id,
        operations = outcomes.operations,
        conflicts = outcomes.conflicts,
        elapsed_ms,
        "contention run finished"
    );

    Ok(ContentionReport {
        params: params.clone(),
        outcomes,
        telemetry: engine.telemetry(),
        final_statuses,
        violations,
        elapsed_ms,
        ops_per_sec,
    })
}

fn register_cast(
    engine: &RideEngine,
    registry: &InMemoryIdentityRegistry,
    params: &ContentionParams,
) -> Result<Cast, RunnerError> {
    let register = |prefix: &str, index: usize, role: Role| -> Result<UserId, RunnerError> {
        let name = format!("{prefix}-{index}");
        let user = registry.register(&name, &format!("{name}@example.com"), role)?;
        engine.sync_user(user.id)?;
        Ok(user.id)
    };
    let riders = (0..params.riders)
        .map(|i| register("rider", i, Role::Rider))
        .collect::<Result<Vec<_>, _>>()?;
    let drivers = (0..params.drivers)
        .map(|i| register("driver", i, Role::Driver))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Cast { riders, drivers })
}

fn pick<T: Copy>(rng: &mut StdRng, items: &[T]) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[rng.gen_range(0..items.len())])
    }
}

/// Any cast member, drivers and riders alike.
fn anyone(rng: &mut StdRng, cast: &Cast) -> Option<UserId> {
    if rng.gen_bool(0.5) {
        pick(rng, &cast.drivers).or_else(|| pick(rng, &cast.riders))
    } else {
        pick(rng, &cast.riders)
    }
}

fn step(
    engine: &RideEngine,
    registry: &InMemoryIdentityRegistry,
    cast: &Cast,
    rides: &Mutex<Vec<RideId>>,
    rng: &mut StdRng,
    counts: &mut OutcomeCounts,
) {
    let known: Vec<RideId> = rides.lock().unwrap_or_else(PoisonError::into_inner).clone();
    let roll = rng.gen_range(0..100);

    // Everything but ride creation needs an existing ride.
    let ride_id = match (roll, pick(rng, &known)) {
        (0..=19, _) | (_, None) => {
            let Some(rider) = pick(rng, &cast.riders) else {
                return;
            };
            let result = engine.create_ride(rider, "pickup", "dropoff");
            if let Ok(ride) = &result {
                rides
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(ride.id);
            }
            counts.record(&result, |c| c.rides_created += 1);
            return;
        }
        (_, Some(ride_id)) => ride_id,
    };

    match roll {
        20..=39 => {
            let result = engine.match_ride(ride_id);
            counts.record(&result, |c| c.matched += 1);
        }
        40..=54 => {
            let Some(driver) = pick(rng, &cast.drivers) else {
                return;
            };
            let result = engine.accept(ride_id, driver);
            counts.record(&result, |c| c.accepted += 1);
        }
        55..=74 => {
            let Ok(ride) = engine.get_ride(ride_id) else {
                return;
            };
            let next = match ride.status {
                RideStatus::Accepted => RideStatus::InProgress,
                RideStatus::InProgress => RideStatus::Completed,
                other => other,
            };
            // Mostly the assigned driver, sometimes an impostor.
            let actor = match ride.driver_id {
                Some(driver) if rng.gen_bool(0.9) => Some(driver),
                _ => anyone(rng, cast),
            };
            let Some(actor) = actor else {
                return;
            };
            let result = engine.transition(ride_id, next, actor);
            counts.record(&result, |c| c.transitions += 1);
        }
        75..=84 => {
            let Ok(ride) = engine.get_ride(ride_id) else {
                return;
            };
            let actor = match ride.driver_id {
                Some(driver) if rng.gen_bool(0.4) => Some(driver),
                _ if rng.gen_bool(0.8) => Some(ride.rider_id),
                _ => anyone(rng, cast),
            };
            let Some(actor) = actor else {
                return;
            };
            let result = engine.cancel(ride_id, actor);
            counts.record(&result, |c| c.transitions += 1);
        }
        85..=94 => {
            let Ok(ride) = engine.get_ride(ride_id) else {
                return;
            };
            let actor = ride.driver_id.unwrap_or(ride.rider_id);
            // A tenth of reports are out of range.
            let point = GeoPoint {
                longitude: rng.gen_range(-200.0..200.0),
                latitude: rng.gen_range(-90.0..90.0),
            };
            let result = engine.update_location(ride_id, point, actor);
            counts.record(&result, |c| c.location_updates += 1);
        }
        _ => {
            let Some(driver) = pick(rng, &cast.drivers) else {
                return;
            };
            let active = rng.gen_bool(0.7);
            if registry.set_active(driver, active).is_ok() {
                let result = engine.sync_user(driver);
                counts.record(&result, |_| {});
            }
        }
    }
}

/// Run every parameter set, in parallel on a rayon pool.
///
/// Results come back in input order. `num_threads` sizes the pool; each run
/// additionally spawns its own `threads` workers.
pub fn run_parallel_contention(
    runs: Vec<ContentionParams>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<ContentionReport>, RunnerError> {
    let progress = (show_progress && !runs.is_empty()).then(|| {
        let bar = ProgressBar::new(runs.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    });

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let results = pool.install(|| {
        runs.par_iter()
            .map(|params| {
                let report = run_contention(params);
                if let Some(bar) = &progress {
                    bar.inc(1);
                }
                report
            })
            .collect::<Result<Vec<_>, _>>()
    });

    if let Some(bar) = &progress {
        bar.finish_with_message("Completed");
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ContentionSpace;
    use ride_core::MatchingPolicyKind;

    fn small() -> ContentionParams {
        ContentionParams::default()
            .with_riders(6)
            .with_drivers(3)
            .with_threads(4)
            .with_ops_per_thread(300)
    }

    #[test]
    fn contention_run_preserves_invariants() {
        let report = run_contention(&small()).unwrap();
        assert!(report.violations.is_empty(), "{:?}", report.violations);
        assert_eq!(report.outcomes.operations, 4 * 300);
        assert_eq!(report.outcomes.other_errors, 0);
        assert!(report.outcomes.rides_created > 0);
        assert_eq!(
            report.final_statuses.values().sum::<usize>() as u64,
            report.outcomes.rides_created
        );
        assert_eq!(report.telemetry.rides_created, report.outcomes.rides_created);
    }

    #[test]
    fn rejects_empty_cast() {
        assert!(matches!(
            run_contention(&small().with_riders(0)),
            Err(RunnerError::InvalidParams(_))
        ));
    }

    #[test]
    fn runs_without_drivers() {
        let report = run_contention(&small().with_drivers(0)).unwrap();
        assert!(report.violations.is_empty());
        assert_eq!(report.outcomes.matched, 0);
        assert_eq!(report.outcomes.accepted, 0);
    }

    #[test]
    fn single_thread_runs_are_reproducible() {
        let params = small().with_threads(1);
        let first = run_contention(&params).unwrap();
        let second = run_contention(&params).unwrap();
        assert_eq!(first.outcomes, second.outcomes);
        assert_eq!(first.final_statuses, second.final_statuses);
    }

    #[test]
    fn parallel_runs_keep_input_order() {
        let runs = ContentionSpace::with_base(small())
            .drivers(vec![1, 2])
            .policies(vec![
                MatchingPolicyKind::LowestDriverId,
                MatchingPolicyKind::LongestIdle,
            ])
            .generate();
        let reports = run_parallel_contention(runs.clone(), Some(2), false).unwrap();
        assert_eq!(reports.len(), runs.len());
        for (report, params) in reports.iter().zip(&runs) {
            assert_eq!(&report.params, params);
            assert!(report.violations.is_empty());
        }
    }
}
