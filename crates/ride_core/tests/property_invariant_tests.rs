//! Random operation sequences never break the ride or availability invariants.

mod support;

use std::collections::HashSet;

use proptest::prelude::*;
use ride_core::identity::IdentityRegistry;
use ride_core::model::{RideId, RideStatus, UserId};
use ride_core::spatial::GeoPoint;
use ride_core::test_helpers::TestWorld;

use support::world::TestWorldConfig;

const RIDERS: usize = 3;
const DRIVERS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Create { rider: usize },
    Match { ride: usize },
    Accept { ride: usize, user: usize },
    Transition { ride: usize, status: usize, user: usize },
    Location { ride: usize, user: usize, longitude: f64, latitude: f64 },
    SetActive { driver: usize, active: bool },
}

fn op() -> impl Strategy<Value = Op> {
    let users = RIDERS + DRIVERS;
    prop_oneof![
        (0..RIDERS).prop_map(|rider| Op::Create { rider }),
        (0..8usize).prop_map(|ride| Op::Match { ride }),
        (0..8usize, 0..users).prop_map(|(ride, user)| Op::Accept { ride, user }),
        (0..8usize, 0..RideStatus::ALL.len(), 0..users)
            .prop_map(|(ride, status, user)| Op::Transition { ride, status, user }),
        (0..8usize, 0..users, -200.0..200.0f64, -100.0..100.0f64).prop_map(
            |(ride, user, longitude, latitude)| Op::Location {
                ride,
                user,
                longitude,
                latitude
            }
        ),
        (0..DRIVERS, any::<bool>()).prop_map(|(driver, active)| Op::SetActive { driver, active }),
    ]
}

/// Ride indices past the end address a ride that doesn't exist.
fn ride_at(rides: &[RideId], index: usize) -> RideId {
    rides.get(index).copied().unwrap_or(RideId(10_000))
}

fn apply(world: &TestWorld, users: &[UserId], rides: &mut Vec<RideId>, op: &Op) {
    let engine = &world.engine;
    match *op {
        Op::Create { rider } => {
            if let Ok(ride) = engine.create_ride(users[rider], "A", "B") {
                rides.push(ride.id);
            }
        }
        Op::Match { ride } => {
            let _ = engine.match_ride(ride_at(rides, ride));
        }
        Op::Accept { ride, user } => {
            let _ = engine.accept(ride_at(rides, ride), users[user]);
        }
        Op::Transition { ride, status, user } => {
            let _ = engine.transition(ride_at(rides, ride), RideStatus::ALL[status], users[user]);
        }
        Op::Location {
            ride,
            user,
            longitude,
            latitude,
        } => {
            let point = GeoPoint {
                longitude,
                latitude,
            };
            let before = engine.get_ride(ride_at(rides, ride)).ok();
            let result = engine.update_location(ride_at(rides, ride), point, users[user]);
            if point.validate().is_err() {
                assert!(result.is_err());
                assert_eq!(engine.get_ride(ride_at(rides, ride)).ok(), before);
            }
        }
        Op::SetActive { driver, active } => {
            world.set_active(users[RIDERS + driver], active);
        }
    }
}

fn check_invariants(world: &TestWorld) {
    let mut holders = HashSet::new();
    for ride in world.engine.list_rides() {
        assert_ne!(ride.driver_id, Some(ride.rider_id), "{ride:?}");
        assert!(ride.check_invariants().is_ok(), "{ride:?}");
        if let (true, Some(driver)) = (ride.status.holds_driver(), ride.driver_id) {
            assert!(holders.insert(driver), "driver {driver} committed twice");
            assert_eq!(world.engine.availability().committed_ride(driver), Some(ride.id));
        }
    }
    for driver in world.registry.drivers() {
        let expected = world.registry.is_active(driver) && !holders.contains(&driver);
        assert_eq!(world.engine.availability().is_available(driver), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn invariants_hold_for_any_operation_sequence(ops in prop::collection::vec(op(), 1..60)) {
        let seeded = TestWorldConfig::default()
            .with_riders(RIDERS)
            .with_drivers(DRIVERS)
            .build();
        let users: Vec<UserId> = seeded.riders.iter().chain(&seeded.drivers).copied().collect();
        let mut rides = Vec::new();

        for op in &ops {
            apply(&seeded.world, &users, &mut rides, op);
            check_invariants(&seeded.world);
        }
    }

    #[test]
    fn statuses_only_move_along_legal_edges(ops in prop::collection::vec(op(), 1..40)) {
        let seeded = TestWorldConfig::default()
            .with_riders(RIDERS)
            .with_drivers(DRIVERS)
            .build();
        let users: Vec<UserId> = seeded.riders.iter().chain(&seeded.drivers).copied().collect();
        let mut rides = Vec::new();

        for op in &ops {
            let before: Vec<_> = seeded.world.engine.list_rides();
            apply(&seeded.world, &users, &mut rides, op);
            for old in before {
                let new = seeded.world.engine.get_ride(old.id).unwrap();
                prop_assert!(
                    new.status == old.status || old.status.can_transition_to(new.status),
                    "illegal edge {} -> {}", old.status, new.status
                );
            }
        }
    }
}
