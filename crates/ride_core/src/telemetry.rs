//! Telemetry / KPIs: lock-free counters shared by the engine components.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct EngineTelemetry {
    rides_created: AtomicU64,
    matches_committed: AtomicU64,
    matches_without_candidates: AtomicU64,
    match_races_lost: AtomicU64,
    accepts_committed: AtomicU64,
    accept_conflicts: AtomicU64,
    transitions_applied: AtomicU64,
    location_updates: AtomicU64,
    geocode_resolved: AtomicU64,
    geocode_failed: AtomicU64,
    geocode_dropped: AtomicU64,
}

/// Point-in-time copy of [`EngineTelemetry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub rides_created: u64,
    pub matches_committed: u64,
    pub matches_without_candidates: u64,
    pub match_races_lost: u64,
    pub accepts_committed: u64,
    pub accept_conflicts: u64,
    pub transitions_applied: u64,
    pub location_updates: u64,
    pub geocode_resolved: u64,
    pub geocode_failed: u64,
    pub geocode_dropped: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ride_created(&self) {
        bump(&self.rides_created);
    }

    pub fn record_match_committed(&self) {
        bump(&self.matches_committed);
    }

    pub fn record_match_without_candidates(&self) {
        bump(&self.matches_without_candidates);
    }

    pub fn record_match_race_lost(&self) {
        bump(&self.match_races_lost);
    }

    pub fn record_accept_committed(&self) {
        bump(&self.accepts_committed);
    }

    pub fn record_accept_conflict(&self) {
        bump(&self.accept_conflicts);
    }

    pub fn record_transition(&self) {
        bump(&self.transitions_applied);
    }

    pub fn record_location_update(&self) {
        bump(&self.location_updates);
    }

    pub fn record_geocode_resolved(&self) {
        bump(&self.geocode_resolved);
    }

    pub fn record_geocode_failed(&self) {
        bump(&self.geocode_failed);
    }

    pub fn record_geocode_dropped(&self) {
        bump(&self.geocode_dropped);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        TelemetrySnapshot {
            rides_created: load(&self.rides_created),
            matches_committed: load(&self.matches_committed),
            matches_without_candidates: load(&self.matches_without_candidates),
            match_races_lost: load(&self.match_races_lost),
            accepts_committed: load(&self.accepts_committed),
            accept_conflicts: load(&self.accept_conflicts),
            transitions_applied: load(&self.transitions_applied),
            location_updates: load(&self.location_updates),
            geocode_resolved: load(&self.geocode_resolved),
            geocode_failed: load(&self.geocode_failed),
            geocode_dropped: load(&self.geocode_dropped),
        }
    }
}

impl TelemetrySnapshot {
    /// Share of match attempts that ended with a driver.
    pub fn match_success_rate(&self) -> f64 {
        let attempts =
            self.matches_committed + self.matches_without_candidates + self.match_races_lost;
        if attempts == 0 {
            return 0.0;
        }
        self.matches_committed as f64 / attempts as f64
    }
}
