//! Driver availability index.
//!
//! A derived view over the identity registry and the ride store: a driver is
//! eligible when active and not holding an Accepted or InProgress ride.
//! Assignment and release run their ride-store write inside this index's
//! critical section ([`AvailabilityIndex::commit_with`],
//! [`AvailabilityIndex::release_with`]), so the two stores change together
//! and nobody observes a driver that is both available and assigned.
//!
//! Drivers the index has never seen are seeded from the registry on first
//! use, so a registry behind the trait does not need to report every signup.
//!
//! Lock order is always index, then ride.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::RideError;
use crate::identity::IdentityRegistry;
use crate::model::{RideId, Role, UserId};
use crate::store::RideStore;

/// An eligible driver as seen by a matching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub driver_id: UserId,
    /// Index sequence number at which the driver last became eligible; smaller waited longer.
    pub available_since: u64,
}

#[derive(Debug, Clone, Copy)]
struct DriverSlot {
    active: bool,
    committed_to: Option<RideId>,
    available_since: u64,
}

impl DriverSlot {
    fn is_eligible(&self) -> bool {
        self.active && self.committed_to.is_none()
    }
}

#[derive(Debug, Default)]
struct AvailabilityState {
    drivers: BTreeMap<UserId, DriverSlot>,
    sequence: u64,
}

impl AvailabilityState {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn is_eligible(&self, driver: UserId) -> bool {
        self.drivers.get(&driver).is_some_and(DriverSlot::is_eligible)
    }

    fn commit(&mut self, driver: UserId, ride: RideId) -> Result<(), RideError> {
        match self.drivers.get_mut(&driver) {
            Some(slot) if slot.is_eligible() => {
                slot.committed_to = Some(ride);
                Ok(())
            }
            _ => Err(RideError::DriverUnavailable { driver }),
        }
    }

    fn set_active(&mut self, driver: UserId, active: bool) {
        let sequence = self.next_sequence();
        let slot = self.drivers.entry(driver).or_insert(DriverSlot {
            active: false,
            committed_to: None,
            available_since: sequence,
        });
        if active && !slot.active {
            slot.available_since = sequence;
        }
        slot.active = active;
    }

    /// Add `driver` from the registry if the index has no slot for it yet.
    fn seed_from(&mut self, identity: &dyn IdentityRegistry, driver: UserId) -> bool {
        if self.drivers.contains_key(&driver) {
            return false;
        }
        if !matches!(identity.get_role(driver), Ok(Role::Driver)) {
            return false;
        }
        let active = identity.is_active(driver);
        self.set_active(driver, active);
        tracing::debug!(driver = %driver, active, "driver seeded from registry");
        true
    }

    fn release(&mut self, driver: UserId) {
        let sequence = self.next_sequence();
        match self.drivers.get_mut(&driver) {
            Some(slot) if slot.committed_to.is_some() => {
                slot.committed_to = None;
                slot.available_since = sequence;
            }
            Some(_) => {}
            None => tracing::debug!(driver = %driver, "release for unknown driver ignored"),
        }
    }
}

#[derive(Debug, Default)]
pub struct AvailabilityIndex {
    state: Mutex<AvailabilityState>,
}

impl AvailabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AvailabilityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a driver or update its online state. A committed driver stays
    /// committed; going active again makes it eligible only once released.
    pub fn sync_driver(&self, driver: UserId, active: bool) {
        self.lock().set_active(driver, active);
    }

    /// [`AvailabilityIndex::sync_driver`] with the online state read from
    /// `identity` under the index lock, so concurrent refreshes settle on the
    /// registry's latest value.
    pub fn refresh_driver(&self, identity: &dyn IdentityRegistry, driver: UserId) {
        let mut state = self.lock();
        state.set_active(driver, identity.is_active(driver));
    }

    /// Seed every registry driver the index has not seen yet. Known drivers
    /// are left alone. Returns how many were added.
    pub fn discover(&self, identity: &dyn IdentityRegistry) -> usize {
        let mut state = self.lock();
        let mut seeded = 0;
        for driver in identity.drivers() {
            if state.seed_from(identity, driver) {
                seeded += 1;
            }
        }
        seeded
    }

    /// Remove `driver` from the eligible set in favour of `ride`.
    ///
    /// For callers that write the ride record themselves. The engine's own
    /// assignments go through [`AvailabilityIndex::commit_with`].
    pub fn mark_committed(&self, driver: UserId, ride: RideId) -> Result<(), RideError> {
        self.lock().commit(driver, ride)
    }

    /// Return `driver` to the eligible set (if still active).
    pub fn mark_released(&self, driver: UserId) {
        self.lock().release(driver);
    }

    /// Eligible drivers other than `excluding`, ordered by driver id.
    pub fn candidates(&self, excluding: UserId) -> Vec<Candidate> {
        self.lock()
            .drivers
            .iter()
            .filter(|(id, slot)| **id != excluding && slot.is_eligible())
            .map(|(id, slot)| Candidate {
                driver_id: *id,
                available_since: slot.available_since,
            })
            .collect()
    }

    pub fn is_available(&self, driver: UserId) -> bool {
        self.lock().is_eligible(driver)
    }

    /// Whether the index holds a slot for `driver`, seeded or synced.
    pub fn is_tracked(&self, driver: UserId) -> bool {
        self.lock().drivers.contains_key(&driver)
    }

    pub fn committed_ride(&self, driver: UserId) -> Option<RideId> {
        self.lock().drivers.get(&driver).and_then(|slot| slot.committed_to)
    }

    /// Run `update` while holding the index lock and commit `driver` to `ride`
    /// if it succeeds. A driver unknown to the index is first seeded from
    /// `identity`. Fails with DriverUnavailable before running `update` if
    /// the driver is not eligible.
    pub fn commit_with<T>(
        &self,
        identity: &dyn IdentityRegistry,
        driver: UserId,
        ride: RideId,
        update: impl FnOnce() -> Result<T, RideError>,
    ) -> Result<T, RideError> {
        let mut state = self.lock();
        state.seed_from(identity, driver);
        if !state.is_eligible(driver) {
            return Err(RideError::DriverUnavailable { driver });
        }
        let output = update()?;
        state.commit(driver, ride)?;
        Ok(output)
    }

    /// Run `update` while holding the index lock and release `driver` if it succeeds.
    pub fn release_with<T>(
        &self,
        driver: UserId,
        update: impl FnOnce() -> Result<T, RideError>,
    ) -> Result<T, RideError> {
        let mut state = self.lock();
        let output = update()?;
        state.release(driver);
        Ok(output)
    }

    /// Recompute the index from the registry and the ride store.
    ///
    /// Runs entirely under the index lock, so it serializes with commits and
    /// releases. Drivers whose eligibility did not change keep their place in
    /// line. Returns the number of eligible drivers.
    pub fn rebuild(&self, identity: &dyn IdentityRegistry, store: &dyn RideStore) -> usize {
        let mut state = self.lock();

        let mut committed: BTreeMap<UserId, RideId> = BTreeMap::new();
        for ride in store.list() {
            if let (true, Some(driver)) = (ride.status.holds_driver(), ride.driver_id) {
                committed.insert(driver, ride.id);
            }
        }

        let mut drivers = BTreeMap::new();
        for driver in identity.drivers() {
            let active = identity.is_active(driver);
            let committed_to = committed.get(&driver).copied();
            let previous = state.drivers.get(&driver).copied();
            let available_since = match previous {
                Some(slot) if slot.active == active && slot.committed_to == committed_to => {
                    slot.available_since
                }
                _ => state.next_sequence(),
            };
            drivers.insert(
                driver,
                DriverSlot {
                    active,
                    committed_to,
                    available_since,
                },
            );
        }
        state.drivers = drivers;

        let eligible = state.drivers.values().filter(|slot| slot.is_eligible()).count();
        tracing::info!(drivers = state.drivers.len(), eligible, "availability index rebuilt");
        eligible
    }
}
