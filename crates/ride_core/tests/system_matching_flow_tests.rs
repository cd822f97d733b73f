mod support;

use ride_core::error::RideError;
use ride_core::matching::MatchingPolicyKind;
use ride_core::model::{RideStatus, Role};

use support::rides::ride_in_status;
use support::world::TestWorldConfig;

#[test]
fn matched_ride_rejects_a_second_driver() {
    let seeded = TestWorldConfig::default().build();
    let engine = &seeded.world.engine;
    let rider = seeded.rider();
    let (d1, d2) = (seeded.drivers[0], seeded.drivers[1]);

    let ride = engine.create_ride(rider, "A", "B").unwrap();
    assert_eq!(ride.status, RideStatus::Requested);
    assert_eq!(ride.driver_id, None);

    assert_eq!(engine.match_ride(ride.id), Ok(d1));
    let matched = engine.get_ride(ride.id).unwrap();
    assert_eq!(matched.status, RideStatus::Accepted);
    assert_eq!(matched.driver_id, Some(d1));
    assert!(!engine.availability().is_available(d1));

    assert!(matches!(
        engine.accept(ride.id, d2),
        Err(RideError::Conflict { .. })
    ));
    assert_eq!(engine.get_ride(ride.id).unwrap(), matched);
    assert!(engine.availability().is_available(d2));
}

#[test]
fn no_active_drivers_means_no_match() {
    let seeded = TestWorldConfig::default().build();
    let world = &seeded.world;
    for driver in &seeded.drivers {
        world.set_active(*driver, false);
    }
    let ride = world.engine.create_ride(seeded.rider(), "A", "B").unwrap();

    let err = world.engine.match_ride(ride.id).unwrap_err();
    assert_eq!(err, RideError::NoMatch { ride: ride.id });
    assert!(err.is_retryable());
    assert_eq!(world.engine.get_ride(ride.id).unwrap().status, RideStatus::Requested);
    assert_eq!(world.engine.telemetry().matches_without_candidates, 1);
}

#[test]
fn empty_world_has_no_match() {
    let seeded = TestWorldConfig::default().with_drivers(0).build();
    let ride = seeded.world.engine.create_ride(seeded.rider(), "A", "B").unwrap();
    assert_eq!(
        seeded.world.engine.match_ride(ride.id),
        Err(RideError::NoMatch { ride: ride.id })
    );
}

#[test]
fn matching_is_deterministic_lowest_id_first() {
    let seeded = TestWorldConfig::default().with_riders(3).with_drivers(3).build();
    let engine = &seeded.world.engine;

    let matched: Vec<_> = seeded
        .riders
        .iter()
        .map(|rider| {
            let ride = engine.create_ride(*rider, "A", "B").unwrap();
            engine.match_ride(ride.id).unwrap()
        })
        .collect();
    assert_eq!(matched, seeded.drivers);
}

#[test]
fn longest_idle_prefers_driver_who_waited_longest() {
    let seeded = TestWorldConfig::default()
        .with_riders(3)
        .with_policy(MatchingPolicyKind::LongestIdle)
        .build();
    let world = &seeded.world;
    let (d1, d2) = (seeded.drivers[0], seeded.drivers[1]);

    // d1 finishes a ride and goes to the back of the line.
    ride_in_status(world, seeded.riders[0], d1, RideStatus::Completed);
    let ride = world.engine.create_ride(seeded.riders[1], "A", "B").unwrap();
    assert_eq!(world.engine.match_ride(ride.id), Ok(d2));

    let ride = world.engine.create_ride(seeded.riders[2], "A", "B").unwrap();
    assert_eq!(world.engine.match_ride(ride.id), Ok(d1));
}

#[test]
fn completed_driver_is_matchable_again() {
    let seeded = TestWorldConfig::default().with_riders(2).with_drivers(1).build();
    let world = &seeded.world;
    let driver = seeded.drivers[0];

    let first = world.engine.create_ride(seeded.riders[0], "A", "B").unwrap();
    assert_eq!(world.engine.match_ride(first.id), Ok(driver));
    let second = world.engine.create_ride(seeded.riders[1], "A", "B").unwrap();
    assert!(world.engine.match_ride(second.id).is_err());

    world
        .engine
        .transition(first.id, RideStatus::InProgress, driver)
        .unwrap();
    world
        .engine
        .transition(first.id, RideStatus::Completed, driver)
        .unwrap();
    assert_eq!(world.engine.match_ride(second.id), Ok(driver));
}

#[test]
fn match_for_rider_without_requests() {
    let seeded = TestWorldConfig::default().build();
    let rider = seeded.rider();
    let err = seeded.world.engine.match_for_rider(rider).unwrap_err();
    assert_eq!(err, RideError::NoPendingRequest { rider });
}

#[test]
fn match_for_rider_matches_pending_ride() {
    let seeded = TestWorldConfig::default().build();
    let world = &seeded.world;
    let ride = world.engine.create_ride(seeded.rider(), "A", "B").unwrap();

    let (ride_id, driver) = world.engine.match_for_rider(seeded.rider()).unwrap();
    assert_eq!(ride_id, ride.id);
    assert_eq!(driver, seeded.drivers[0]);
    assert_eq!(world.engine.get_ride(ride.id).unwrap().driver_id, Some(driver));
}

#[test]
fn drivers_registered_as_riders_are_never_candidates() {
    let seeded = TestWorldConfig::default().with_drivers(0).build();
    let world = &seeded.world;
    let other_rider = world.user("not-a-driver", Role::Rider);
    let ride = world.engine.create_ride(seeded.rider(), "A", "B").unwrap();

    assert!(world.engine.match_ride(ride.id).is_err());
    assert!(!world.engine.availability().is_available(other_rider));
}

#[test]
fn driver_registered_without_sync_is_matched() {
    let seeded = TestWorldConfig::default().with_drivers(0).build();
    let world = &seeded.world;
    let driver = world
        .registry
        .register("late", "late@example.com", Role::Driver)
        .unwrap()
        .id;
    assert!(!world.engine.availability().is_tracked(driver));

    let ride = world.engine.create_ride(seeded.rider(), "A", "B").unwrap();
    assert_eq!(world.engine.match_ride(ride.id), Ok(driver));
    assert_eq!(world.engine.availability().committed_ride(driver), Some(ride.id));
}
