//! The single code path that puts a driver on a ride.
//!
//! Both the matching engine and an explicit driver accept end up here, so the
//! race behaviour is identical: the ride must still be Requested and the
//! driver still eligible, and both facts flip in one critical section.

use crate::availability::AvailabilityIndex;
use crate::error::RideError;
use crate::identity::IdentityRegistry;
use crate::model::{Ride, RideId, RideStatus, Role, UserId};
use crate::store::RideStore;

pub fn assign_driver(
    store: &dyn RideStore,
    identity: &dyn IdentityRegistry,
    availability: &AvailabilityIndex,
    ride_id: RideId,
    driver_id: UserId,
) -> Result<Ride, RideError> {
    availability.commit_with(identity, driver_id, ride_id, || {
        store.compare_and_update(ride_id, RideStatus::Requested, &mut |ride| {
            if ride.rider_id == driver_id {
                return Err(RideError::InvalidRole {
                    user: driver_id,
                    required: Role::Driver,
                });
            }
            ride.driver_id = Some(driver_id);
            ride.status = RideStatus::Accepted;
            Ok(())
        })
    })
}
