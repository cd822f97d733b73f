#![allow(dead_code)]

use ride_core::model::{Ride, RideStatus, UserId};
use ride_core::test_helpers::{TestWorld, TEST_DROPOFF, TEST_PICKUP};

/// Create a ride for `rider` and drive it to `status` with `driver`.
pub fn ride_in_status(world: &TestWorld, rider: UserId, driver: UserId, status: RideStatus) -> Ride {
    let engine = &world.engine;
    let ride = engine
        .create_ride(rider, TEST_PICKUP, TEST_DROPOFF)
        .expect("create ride");
    match status {
        RideStatus::Requested => ride,
        RideStatus::Cancelled => engine.cancel(ride.id, rider).expect("cancel"),
        RideStatus::Accepted => engine.accept(ride.id, driver).expect("accept"),
        RideStatus::InProgress => {
            engine.accept(ride.id, driver).expect("accept");
            engine
                .transition(ride.id, RideStatus::InProgress, driver)
                .expect("start")
        }
        RideStatus::Completed => {
            engine.accept(ride.id, driver).expect("accept");
            engine
                .transition(ride.id, RideStatus::InProgress, driver)
                .expect("start");
            engine
                .transition(ride.id, RideStatus::Completed, driver)
                .expect("complete")
        }
    }
}
