//! Ride storage and the compare-and-update primitive.
//!
//! Every change to a ride's status, driver or location goes through
//! [`RideStore::compare_and_update`]: the write only lands if the ride is
//! still in the status the caller observed. Two concurrent writers keyed on
//! the same status therefore resolve to one success and one
//! [`RideError::Conflict`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;

use crate::error::{EntityRef, RideError};
use crate::identity::IdentityRegistry;
use crate::model::{Ride, RideId, RideStatus, Role, UserId};
use crate::spatial::GeoPoint;

/// Mutation applied by [`RideStore::compare_and_update`]. Returning an error
/// aborts the write and leaves the stored ride untouched.
pub type RideMutation<'a> = &'a mut dyn FnMut(&mut Ride) -> Result<(), RideError>;

pub trait RideStore: Send + Sync {
    /// Create a Requested ride. Fails with InvalidRole unless `rider_id` is a Rider.
    fn create(&self, rider_id: UserId, pickup: &str, dropoff: &str) -> Result<Ride, RideError>;

    fn get(&self, ride_id: RideId) -> Result<Ride, RideError>;

    /// Atomically apply `mutation` if the ride is still `expected`.
    ///
    /// The mutation runs on a copy; the copy is persisted only when the
    /// mutation succeeds and the result still satisfies the ride invariants.
    fn compare_and_update(
        &self,
        ride_id: RideId,
        expected: RideStatus,
        mutation: RideMutation<'_>,
    ) -> Result<Ride, RideError>;

    /// Snapshot of all rides, in no particular order.
    fn list(&self) -> Vec<Ride>;

    /// Store a resolved city if the ride is still at `at`. Returns whether it was written.
    fn record_city(&self, ride_id: RideId, at: GeoPoint, city: &str) -> Result<bool, RideError>;
}

/// Ride store backed by a map of per-ride mutexes.
///
/// The outer lock only guards membership; writers on different rides never
/// contend with each other.
pub struct InMemoryRideStore {
    identity: Arc<dyn IdentityRegistry>,
    rides: RwLock<HashMap<RideId, Arc<Mutex<Ride>>>>,
    next_id: AtomicU64,
}

impl InMemoryRideStore {
    pub fn new(identity: Arc<dyn IdentityRegistry>) -> Self {
        Self {
            identity,
            rides: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn slot(&self, ride_id: RideId) -> Result<Arc<Mutex<Ride>>, RideError> {
        self.rides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ride_id)
            .cloned()
            .ok_or(RideError::NotFound(EntityRef::Ride(ride_id)))
    }

    pub fn len(&self) -> usize {
        self.rides.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RideStore for InMemoryRideStore {
    fn create(&self, rider_id: UserId, pickup: &str, dropoff: &str) -> Result<Ride, RideError> {
        match self.identity.get_role(rider_id)? {
            Role::Rider => {}
            Role::Driver => {
                return Err(RideError::InvalidRole {
                    user: rider_id,
                    required: Role::Rider,
                })
            }
        }

        let id = RideId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let ride = Ride::new(id, rider_id, pickup, dropoff, Utc::now());
        self.rides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(ride.clone())));
        Ok(ride)
    }

    fn get(&self, ride_id: RideId) -> Result<Ride, RideError> {
        let slot = self.slot(ride_id)?;
        let ride = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Ok(ride)
    }

    fn compare_and_update(
        &self,
        ride_id: RideId,
        expected: RideStatus,
        mutation: RideMutation<'_>,
    ) -> Result<Ride, RideError> {
        let slot = self.slot(ride_id)?;
        // Poisoning is recoverable: the stored value is only ever replaced whole.
        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if current.status != expected {
            return Err(RideError::Conflict {
                ride: ride_id,
                expected,
                actual: current.status,
            });
        }

        let mut next = current.clone();
        mutation(&mut next)?;
        if next.id != current.id || next.rider_id != current.rider_id {
            return Err(RideError::InvariantViolation {
                ride: ride_id,
                detail: "ride identity and rider are immutable",
            });
        }
        next.check_invariants()?;
        next.updated_at = Utc::now();
        *current = next.clone();
        Ok(next)
    }

    fn list(&self) -> Vec<Ride> {
        let slots: Vec<Arc<Mutex<Ride>>> = self
            .rides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        slots
            .iter()
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    fn record_city(&self, ride_id: RideId, at: GeoPoint, city: &str) -> Result<bool, RideError> {
        let slot = self.slot(ride_id)?;
        let mut ride = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if ride.current_location != Some(at) {
            return Ok(false);
        }
        ride.city = Some(city.to_string());
        ride.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityRegistry;

    fn store_with_users() -> (InMemoryRideStore, UserId, UserId) {
        let identity = Arc::new(InMemoryIdentityRegistry::new());
        let rider = identity.register("r", "r@example.com", Role::Rider).unwrap().id;
        let driver = identity.register("d", "d@example.com", Role::Driver).unwrap().id;
        (InMemoryRideStore::new(identity), rider, driver)
    }

    #[test]
    fn create_requires_rider_role() {
        let (store, rider, driver) = store_with_users();
        let ride = store.create(rider, "A", "B").unwrap();
        assert_eq!(ride.status, RideStatus::Requested);
        assert_eq!(ride.driver_id, None);
        assert_eq!(ride.pickup, "A");

        assert_eq!(
            store.create(driver, "A", "B"),
            Err(RideError::InvalidRole {
                user: driver,
                required: Role::Rider
            })
        );
        assert!(matches!(
            store.create(UserId(99), "A", "B"),
            Err(RideError::NotFound(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn compare_and_update_conflicts_on_stale_status() {
        let (store, rider, driver) = store_with_users();
        let ride = store.create(rider, "A", "B").unwrap();

        let accepted = store
            .compare_and_update(ride.id, RideStatus::Requested, &mut |ride| {
                ride.driver_id = Some(driver);
                ride.status = RideStatus::Accepted;
                Ok(())
            })
            .unwrap();
        assert_eq!(accepted.status, RideStatus::Accepted);

        let stale = store.compare_and_update(ride.id, RideStatus::Requested, &mut |ride| {
            ride.status = RideStatus::Cancelled;
            Ok(())
        });
        assert_eq!(
            stale,
            Err(RideError::Conflict {
                ride: ride.id,
                expected: RideStatus::Requested,
                actual: RideStatus::Accepted,
            })
        );
        assert_eq!(store.get(ride.id).unwrap().status, RideStatus::Accepted);
    }

    #[test]
    fn failed_mutation_leaves_ride_untouched() {
        let (store, rider, _) = store_with_users();
        let ride = store.create(rider, "A", "B").unwrap();

        let result = store.compare_and_update(ride.id, RideStatus::Requested, &mut |ride| {
            ride.driver_id = Some(rider);
            ride.status = RideStatus::Accepted;
            Ok(())
        });
        assert!(matches!(result, Err(RideError::InvariantViolation { .. })));
        assert_eq!(store.get(ride.id).unwrap(), ride);
    }

    #[test]
    fn record_city_ignores_stale_locations() {
        let (store, rider, driver) = store_with_users();
        let ride = store.create(rider, "A", "B").unwrap();
        let first = GeoPoint::new(13.4, 52.5).unwrap();
        let second = GeoPoint::new(2.35, 48.85).unwrap();

        store
            .compare_and_update(ride.id, RideStatus::Requested, &mut |ride| {
                ride.driver_id = Some(driver);
                ride.status = RideStatus::Accepted;
                ride.current_location = Some(second);
                Ok(())
            })
            .unwrap();

        assert_eq!(store.record_city(ride.id, first, "Berlin"), Ok(false));
        assert_eq!(store.record_city(ride.id, second, "Paris"), Ok(true));
        assert_eq!(store.get(ride.id).unwrap().city.as_deref(), Some("Paris"));
    }

    #[test]
    fn unknown_ride_is_not_found() {
        let (store, _, _) = store_with_users();
        assert_eq!(
            store.get(RideId(5)),
            Err(RideError::NotFound(EntityRef::Ride(RideId(5))))
        );
        assert!(store.list().is_empty());
    }
}
