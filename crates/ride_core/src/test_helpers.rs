//! Test helpers for common engine setup.
//!
//! Shared by unit tests, integration tests, benches and the experiments crate.

use std::sync::Arc;

use crate::config::{EngineConfig, GeocodeProviderKind};
use crate::engine::RideEngine;
use crate::identity::InMemoryIdentityRegistry;
use crate::model::{Role, UserId};
use crate::spatial::GeoPoint;

/// Pickup and dropoff text used when a test doesn't care about addresses.
pub const TEST_PICKUP: &str = "Alexanderplatz 1, Berlin";
pub const TEST_DROPOFF: &str = "Potsdamer Platz 1, Berlin";

/// A point inside the default city table's Berlin area.
pub fn test_point() -> GeoPoint {
    GeoPoint {
        longitude: 13.405,
        latitude: 52.52,
    }
}

/// A valid point far from every default city.
pub fn test_remote_point() -> GeoPoint {
    GeoPoint {
        longitude: 45.0,
        latitude: -45.0,
    }
}

/// Engine config with geocoding turned off, for tests that never run a runtime.
pub fn offline_config() -> EngineConfig {
    EngineConfig::default().with_geocode_provider(GeocodeProviderKind::Disabled)
}

/// An in-memory engine plus its registry, with helpers to add users and
/// keep the availability index in step.
pub struct TestWorld {
    pub engine: RideEngine,
    pub registry: Arc<InMemoryIdentityRegistry>,
}

impl TestWorld {
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    pub fn new(config: &EngineConfig) -> Self {
        let (engine, registry) =
            RideEngine::in_memory(config).expect("test engine config should be valid");
        Self { engine, registry }
    }

    pub fn offline() -> Self {
        Self::new(&offline_config())
    }

    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn user(&self, name: &str, role: Role) -> UserId {
        let user = self
            .registry
            .register(name, &format!("{name}@example.com"), role)
            .expect("test usernames should be unique");
        self.engine
            .sync_user(user.id)
            .expect("freshly registered user should exist");
        user.id
    }

    pub fn rider(&self, name: &str) -> UserId {
        self.user(name, Role::Rider)
    }

    pub fn driver(&self, name: &str) -> UserId {
        self.user(name, Role::Driver)
    }

    /// Register `count` drivers named `{prefix}-0..` in id order.
    pub fn drivers(&self, prefix: &str, count: usize) -> Vec<UserId> {
        (0..count)
            .map(|i| self.driver(&format!("{prefix}-{i}")))
            .collect()
    }

    /// # Panics
    ///
    /// Panics if `user` is unknown.
    pub fn set_active(&self, user: UserId, active: bool) {
        self.registry
            .set_active(user, active)
            .expect("user should be registered");
        self.engine
            .sync_user(user)
            .expect("user should be registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_are_valid() {
        assert!(test_point().validate().is_ok());
        assert!(test_remote_point().validate().is_ok());
    }

    #[test]
    fn registered_drivers_become_available() {
        let world = TestWorld::offline();
        let drivers = world.drivers("d", 3);
        assert_eq!(drivers.len(), 3);
        assert!(drivers.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(drivers
            .iter()
            .all(|driver| world.engine.availability().is_available(*driver)));

        world.set_active(drivers[0], false);
        assert!(!world.engine.availability().is_available(drivers[0]));
    }
}
