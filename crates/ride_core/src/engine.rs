//! Engine facade: builds the registry-facing components from an
//! [`EngineConfig`] and exposes every core operation in one place.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::availability::AvailabilityIndex;
use crate::config::{ConfigError, EngineConfig};
use crate::error::RideError;
use crate::geocode::{geocode_channel, GeocodeJob, GeocodeQueue, GeocodeWorker};
use crate::identity::{IdentityRegistry, InMemoryIdentityRegistry};
use crate::lifecycle::RideStateMachine;
use crate::matching::MatchingEngine;
use crate::model::{Ride, RideId, RideStatus, Role, UserId};
use crate::spatial::GeoPoint;
use crate::store::{InMemoryRideStore, RideStore};
use crate::telemetry::{EngineTelemetry, TelemetrySnapshot};

type PendingWorker = (GeocodeWorker, mpsc::Receiver<GeocodeJob>);

pub struct RideEngine {
    identity: Arc<dyn IdentityRegistry>,
    store: Arc<dyn RideStore>,
    availability: Arc<AvailabilityIndex>,
    matching: MatchingEngine,
    lifecycle: RideStateMachine,
    telemetry: Arc<EngineTelemetry>,
    pending_worker: Mutex<Option<PendingWorker>>,
}

impl RideEngine {
    /// Wire an engine over existing registry and store implementations and
    /// seed the availability index from them.
    ///
    /// The geocoding worker is not started here; call
    /// [`RideEngine::start_geocoding`] from inside a tokio runtime. Lookups
    /// queued before that wait in the channel.
    pub fn new(
        config: &EngineConfig,
        identity: Arc<dyn IdentityRegistry>,
        store: Arc<dyn RideStore>,
    ) -> Result<Self, ConfigError> {
        let telemetry = Arc::new(EngineTelemetry::new());
        let availability = Arc::new(AvailabilityIndex::new());

        let (queue, pending_worker) = match config.geocode.build_geocoder()? {
            Some(geocoder) => {
                let (queue, receiver) =
                    geocode_channel(config.geocode.queue_capacity, telemetry.clone());
                let worker = GeocodeWorker::new(
                    geocoder,
                    store.clone(),
                    telemetry.clone(),
                    config.geocode.timeout(),
                )
                .with_max_in_flight(config.geocode.max_in_flight);
                (queue, Some((worker, receiver)))
            }
            None => (GeocodeQueue::disabled(telemetry.clone()), None),
        };

        let matching = MatchingEngine::new(
            identity.clone(),
            store.clone(),
            availability.clone(),
            config.matching_policy.build(),
            telemetry.clone(),
        );
        let lifecycle = RideStateMachine::new(
            identity.clone(),
            store.clone(),
            availability.clone(),
            queue,
            telemetry.clone(),
        );

        availability.rebuild(identity.as_ref(), store.as_ref());
        tracing::info!(
            policy = matching.policy_name(),
            geocoding = pending_worker.is_some(),
            "ride engine ready"
        );

        Ok(Self {
            identity,
            store,
            availability,
            matching,
            lifecycle,
            telemetry,
            pending_worker: Mutex::new(pending_worker),
        })
    }

    /// Engine over fresh in-memory storage. The registry is returned so the
    /// caller can register users; follow each change with [`RideEngine::sync_user`].
    pub fn in_memory(
        config: &EngineConfig,
    ) -> Result<(Self, Arc<InMemoryIdentityRegistry>), ConfigError> {
        let registry = Arc::new(InMemoryIdentityRegistry::new());
        let store = Arc::new(InMemoryRideStore::new(registry.clone()));
        let engine = Self::new(config, registry.clone(), store)?;
        Ok((engine, registry))
    }

    /// Spawn the geocoding worker on the current tokio runtime. Returns
    /// `None` if geocoding is disabled or the worker already runs.
    pub fn start_geocoding(&self) -> Option<JoinHandle<()>> {
        let (worker, receiver) = self
            .pending_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(worker.spawn(receiver))
    }

    /// Bring the availability index in line with the registry for one user.
    pub fn sync_user(&self, user_id: UserId) -> Result<(), RideError> {
        match self.identity.get_role(user_id)? {
            Role::Driver => self
                .availability
                .refresh_driver(self.identity.as_ref(), user_id),
            Role::Rider => {}
        }
        Ok(())
    }

    pub fn rebuild_availability(&self) -> usize {
        self.availability
            .rebuild(self.identity.as_ref(), self.store.as_ref())
    }

    pub fn create_ride(
        &self,
        rider_id: UserId,
        pickup: &str,
        dropoff: &str,
    ) -> Result<Ride, RideError> {
        self.lifecycle.create_ride(rider_id, pickup, dropoff)
    }

    pub fn get_ride(&self, ride_id: RideId) -> Result<Ride, RideError> {
        self.lifecycle.get_ride(ride_id)
    }

    pub fn list_rides(&self) -> Vec<Ride> {
        self.lifecycle.list_rides()
    }

    pub fn match_ride(&self, ride_id: RideId) -> Result<UserId, RideError> {
        self.matching.match_ride(ride_id)
    }

    pub fn match_for_rider(&self, rider_id: UserId) -> Result<(RideId, UserId), RideError> {
        self.matching.match_for_rider(rider_id)
    }

    pub fn accept(&self, ride_id: RideId, driver_id: UserId) -> Result<Ride, RideError> {
        self.lifecycle.accept(ride_id, driver_id)
    }

    pub fn transition(
        &self,
        ride_id: RideId,
        next: RideStatus,
        actor: UserId,
    ) -> Result<Ride, RideError> {
        self.lifecycle.transition(ride_id, next, actor)
    }

    pub fn cancel(&self, ride_id: RideId, actor: UserId) -> Result<Ride, RideError> {
        self.lifecycle.cancel(ride_id, actor)
    }

    pub fn update_location(
        &self,
        ride_id: RideId,
        point: GeoPoint,
        actor: UserId,
    ) -> Result<Ride, RideError> {
        self.lifecycle.update_location(ride_id, point, actor)
    }

    pub fn availability(&self) -> &AvailabilityIndex {
        &self.availability
    }

    pub fn matching(&self) -> &MatchingEngine {
        &self.matching
    }

    pub fn lifecycle(&self) -> &RideStateMachine {
        &self.lifecycle
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeocodeProviderKind;

    fn disabled_geocoding() -> EngineConfig {
        EngineConfig::default().with_geocode_provider(GeocodeProviderKind::Disabled)
    }

    #[test]
    fn sync_user_tracks_driver_activity() {
        let (engine, registry) = RideEngine::in_memory(&disabled_geocoding()).unwrap();
        let driver = registry.register("d", "d@example.com", Role::Driver).unwrap().id;
        let rider = registry.register("r", "r@example.com", Role::Rider).unwrap().id;

        assert!(!engine.availability().is_available(driver));
        engine.sync_user(driver).unwrap();
        engine.sync_user(rider).unwrap();
        assert!(engine.availability().is_available(driver));
        assert!(!engine.availability().is_available(rider));

        registry.set_active(driver, false).unwrap();
        engine.sync_user(driver).unwrap();
        assert!(!engine.availability().is_available(driver));
        assert!(engine.sync_user(UserId(99)).is_err());
    }

    #[test]
    fn rebuild_picks_up_registered_drivers() {
        let (engine, registry) = RideEngine::in_memory(&disabled_geocoding()).unwrap();
        registry.register("d1", "d1@example.com", Role::Driver).unwrap();
        registry.register("d2", "d2@example.com", Role::Driver).unwrap();
        assert_eq!(engine.rebuild_availability(), 2);
    }

    #[test]
    fn geocoding_cannot_start_when_disabled() {
        let (engine, _) = RideEngine::in_memory(&disabled_geocoding()).unwrap();
        assert!(engine.start_geocoding().is_none());
    }
}
