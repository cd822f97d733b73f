//! Post-run invariant checks over a quiescent engine.

use std::collections::BTreeMap;

use ride_core::{IdentityRegistry, RideEngine, UserId};

/// Describe every invariant the engine's final state breaks; empty when sound.
///
/// Only meaningful once no operations are in flight.
pub fn audit(engine: &RideEngine, identity: &dyn IdentityRegistry) -> Vec<String> {
    let mut violations = Vec::new();
    let mut holders: BTreeMap<UserId, u64> = BTreeMap::new();

    for ride in engine.list_rides() {
        if let Err(err) = ride.check_invariants() {
            violations.push(err.to_string());
        }
        let (true, Some(driver)) = (ride.status.holds_driver(), ride.driver_id) else {
            continue;
        };
        if let Some(other) = holders.insert(driver, ride.id.0) {
            violations.push(format!(
                "driver {driver} holds rides {other} and {} at once",
                ride.id
            ));
        }
        if engine.availability().committed_ride(driver) != Some(ride.id) {
            violations.push(format!(
                "driver {driver} holds ride {} but the index disagrees",
                ride.id
            ));
        }
    }

    // Untracked drivers are seeded from the registry on first use.
    for driver in identity
        .drivers()
        .into_iter()
        .filter(|driver| engine.availability().is_tracked(*driver))
    {
        let expected = identity.is_active(driver) && !holders.contains_key(&driver);
        let actual = engine.availability().is_available(driver);
        if expected != actual {
            violations.push(format!(
                "driver {driver} availability is {actual}, expected {expected}"
            ));
        }
    }
    violations
}
