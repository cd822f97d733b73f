use std::sync::Arc;

use crate::assignment::assign_driver;
use crate::availability::{AvailabilityIndex, Candidate};
use crate::error::RideError;
use crate::identity::IdentityRegistry;
use crate::model::{RideId, RideStatus, Role, UserId};
use crate::store::RideStore;
use crate::telemetry::EngineTelemetry;

use super::policy::MatchingPolicy;

/// Finds a driver for a Requested ride and commits the assignment.
///
/// A match makes exactly one commit attempt. If another caller moved the
/// ride or took the chosen driver in the meantime the result is
/// [`RideError::NoMatch`]; callers decide whether to try again.
pub struct MatchingEngine {
    identity: Arc<dyn IdentityRegistry>,
    store: Arc<dyn RideStore>,
    availability: Arc<AvailabilityIndex>,
    policy: Box<dyn MatchingPolicy>,
    telemetry: Arc<EngineTelemetry>,
}

impl MatchingEngine {
    pub fn new(
        identity: Arc<dyn IdentityRegistry>,
        store: Arc<dyn RideStore>,
        availability: Arc<AvailabilityIndex>,
        policy: Box<dyn MatchingPolicy>,
        telemetry: Arc<EngineTelemetry>,
    ) -> Self {
        Self {
            identity,
            store,
            availability,
            policy,
            telemetry,
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Assign a driver to `ride_id` and return it.
    pub fn match_ride(&self, ride_id: RideId) -> Result<UserId, RideError> {
        let ride = self.store.get(ride_id)?;
        if ride.status != RideStatus::Requested {
            return Err(RideError::InvalidState {
                ride: ride_id,
                status: ride.status,
            });
        }

        self.availability.discover(self.identity.as_ref());
        let candidates: Vec<Candidate> = self
            .availability
            .candidates(ride.rider_id)
            .into_iter()
            .filter(|candidate| self.is_assignable(candidate.driver_id))
            .collect();

        let Some(driver_id) = self.policy.select(ride.rider_id, &candidates) else {
            self.telemetry.record_match_without_candidates();
            tracing::debug!(ride = %ride_id, "no eligible drivers");
            return Err(RideError::NoMatch { ride: ride_id });
        };

        match assign_driver(
            self.store.as_ref(),
            self.identity.as_ref(),
            &self.availability,
            ride_id,
            driver_id,
        ) {
            Ok(_) => {
                self.telemetry.record_match_committed();
                tracing::info!(
                    ride = %ride_id,
                    driver = %driver_id,
                    policy = self.policy.name(),
                    candidates = candidates.len(),
                    "ride matched"
                );
                Ok(driver_id)
            }
            Err(err @ (RideError::Conflict { .. } | RideError::DriverUnavailable { .. })) => {
                self.telemetry.record_match_race_lost();
                tracing::debug!(ride = %ride_id, driver = %driver_id, error = %err, "match lost a race");
                Err(RideError::NoMatch { ride: ride_id })
            }
            Err(err) => Err(err),
        }
    }

    /// Match the rider's most recent Requested ride.
    pub fn match_for_rider(&self, rider_id: UserId) -> Result<(RideId, UserId), RideError> {
        let pending = self
            .store
            .list()
            .into_iter()
            .filter(|ride| ride.rider_id == rider_id && ride.status == RideStatus::Requested)
            .max_by_key(|ride| (ride.created_at, ride.id))
            .ok_or(RideError::NoPendingRequest { rider: rider_id })?;
        let driver = self.match_ride(pending.id)?;
        Ok((pending.id, driver))
    }

    fn is_assignable(&self, driver: UserId) -> bool {
        matches!(self.identity.get_role(driver), Ok(Role::Driver))
            && self.identity.is_active(driver)
    }
}
