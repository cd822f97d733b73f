//! The ride state machine.
//!
//! ```text
//! Requested ──accept──▶ Accepted ──▶ InProgress ──▶ Completed
//!     │                    │              │
//!     └────────────────────┴──────────────┴──────▶ Cancelled
//! ```
//!
//! Every write is a compare-and-update keyed on the status the caller
//! observed, so a concurrent writer turns into a Conflict instead of a lost
//! update. Leaving Accepted or InProgress for a terminal state hands the
//! driver back to the availability index inside the same critical section.

use std::sync::Arc;

use crate::assignment::assign_driver;
use crate::availability::AvailabilityIndex;
use crate::error::RideError;
use crate::geocode::{GeocodeJob, GeocodeQueue};
use crate::identity::IdentityRegistry;
use crate::model::{Ride, RideId, RideStatus, Role, UserId};
use crate::spatial::GeoPoint;
use crate::store::RideStore;
use crate::telemetry::EngineTelemetry;

pub struct RideStateMachine {
    identity: Arc<dyn IdentityRegistry>,
    store: Arc<dyn RideStore>,
    availability: Arc<AvailabilityIndex>,
    geocode: GeocodeQueue,
    telemetry: Arc<EngineTelemetry>,
}

impl RideStateMachine {
    pub fn new(
        identity: Arc<dyn IdentityRegistry>,
        store: Arc<dyn RideStore>,
        availability: Arc<AvailabilityIndex>,
        geocode: GeocodeQueue,
        telemetry: Arc<EngineTelemetry>,
    ) -> Self {
        Self {
            identity,
            store,
            availability,
            geocode,
            telemetry,
        }
    }

    pub fn create_ride(
        &self,
        rider_id: UserId,
        pickup: &str,
        dropoff: &str,
    ) -> Result<Ride, RideError> {
        let ride = self.store.create(rider_id, pickup, dropoff)?;
        self.telemetry.record_ride_created();
        tracing::info!(ride = %ride.id, rider = %rider_id, "ride requested");
        Ok(ride)
    }

    /// Driver takes a Requested ride.
    pub fn accept(&self, ride_id: RideId, driver_id: UserId) -> Result<Ride, RideError> {
        match self.identity.get_role(driver_id)? {
            Role::Driver => {}
            Role::Rider => {
                return Err(RideError::InvalidRole {
                    user: driver_id,
                    required: Role::Driver,
                })
            }
        }
        if !self.identity.is_active(driver_id) {
            return Err(RideError::DriverUnavailable { driver: driver_id });
        }
        let ride = self.store.get(ride_id)?;
        if ride.rider_id == driver_id {
            return Err(RideError::InvalidRole {
                user: driver_id,
                required: Role::Driver,
            });
        }

        match assign_driver(
            self.store.as_ref(),
            self.identity.as_ref(),
            &self.availability,
            ride_id,
            driver_id,
        ) {
            Ok(ride) => {
                self.telemetry.record_accept_committed();
                tracing::info!(ride = %ride_id, driver = %driver_id, "ride accepted");
                Ok(ride)
            }
            Err(err) => {
                if matches!(err, RideError::Conflict { .. }) {
                    self.telemetry.record_accept_conflict();
                    tracing::debug!(ride = %ride_id, driver = %driver_id, error = %err, "accept lost a race");
                }
                Err(err)
            }
        }
    }

    /// Move a ride along the lifecycle graph on behalf of `actor`.
    pub fn transition(
        &self,
        ride_id: RideId,
        next: RideStatus,
        actor: UserId,
    ) -> Result<Ride, RideError> {
        let ride = self.store.get(ride_id)?;
        let current = ride.status;
        if !current.can_transition_to(next) {
            return Err(RideError::InvalidTransition {
                ride: ride_id,
                from: current,
                to: next,
            });
        }
        if next == RideStatus::Accepted {
            return self.accept(ride_id, actor);
        }
        self.authorize_transition(&ride, next, actor)?;

        let mut apply = |ride: &mut Ride| -> Result<(), RideError> {
            ride.status = next;
            if next == RideStatus::Cancelled {
                ride.driver_id = None;
            }
            Ok(())
        };

        // Status is keyed, and the driver only changes on leaving Requested,
        // so the driver observed here is the one the write will release.
        let updated = match ride.driver_id {
            Some(driver) if current.holds_driver() && !next.holds_driver() => {
                self.availability.release_with(driver, || {
                    self.store.compare_and_update(ride_id, current, &mut apply)
                })?
            }
            _ => self.store.compare_and_update(ride_id, current, &mut apply)?,
        };

        self.telemetry.record_transition();
        tracing::info!(ride = %ride_id, from = %current, to = %next, actor = %actor, "ride transitioned");
        Ok(updated)
    }

    pub fn cancel(&self, ride_id: RideId, actor: UserId) -> Result<Ride, RideError> {
        self.transition(ride_id, RideStatus::Cancelled, actor)
    }

    /// Record where the ride is. Only the rider or driver of an active ride
    /// may report, and the city is looked up afterwards without waiting.
    pub fn update_location(
        &self,
        ride_id: RideId,
        point: GeoPoint,
        actor: UserId,
    ) -> Result<Ride, RideError> {
        let ride = self.store.get(ride_id)?;
        if !ride.is_party(actor) {
            return Err(RideError::Unauthorized {
                ride: ride_id,
                user: actor,
            });
        }
        if !ride.status.holds_driver() {
            return Err(RideError::InvalidState {
                ride: ride_id,
                status: ride.status,
            });
        }
        point.validate()?;

        let updated = self
            .store
            .compare_and_update(ride_id, ride.status, &mut |ride| {
                ride.current_location = Some(point);
                Ok(())
            })?;
        self.telemetry.record_location_update();

        if self.geocode.enqueue(GeocodeJob { ride_id, point }) {
            tracing::debug!(ride = %ride_id, "city lookup queued");
        }
        Ok(updated)
    }

    pub fn get_ride(&self, ride_id: RideId) -> Result<Ride, RideError> {
        self.store.get(ride_id)
    }

    pub fn list_rides(&self) -> Vec<Ride> {
        self.store.list()
    }

    /// Requested rides are cancelled by their rider or by any active driver,
    /// since none is assigned yet. Assigned rides are advanced by their driver
    /// and cancelled by either party.
    fn authorize_transition(
        &self,
        ride: &Ride,
        next: RideStatus,
        actor: UserId,
    ) -> Result<(), RideError> {
        let allowed = match (ride.status, next) {
            (RideStatus::Requested, RideStatus::Cancelled) => {
                actor == ride.rider_id || self.is_active_driver(actor)
            }
            (RideStatus::Accepted, RideStatus::InProgress)
            | (RideStatus::InProgress, RideStatus::Completed) => ride.driver_id == Some(actor),
            (_, RideStatus::Cancelled) => ride.is_party(actor),
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(RideError::Unauthorized {
                ride: ride.id,
                user: actor,
            })
        }
    }

    fn is_active_driver(&self, user: UserId) -> bool {
        matches!(self.identity.get_role(user), Ok(Role::Driver)) && self.identity.is_active(user)
    }
}
