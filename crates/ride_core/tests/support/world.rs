#![allow(dead_code)]

use ride_core::config::{EngineConfig, GeocodeProviderKind};
use ride_core::matching::MatchingPolicyKind;
use ride_core::model::UserId;
use ride_core::test_helpers::TestWorld;

/// Builder configuration for reproducible test worlds.
#[derive(Clone, Debug)]
pub struct TestWorldConfig {
    pub riders: usize,
    pub drivers: usize,
    pub policy: MatchingPolicyKind,
    pub geocode: GeocodeProviderKind,
    pub geocode_timeout_ms: u64,
    pub geocode_queue_capacity: usize,
}

impl Default for TestWorldConfig {
    fn default() -> Self {
        Self {
            riders: 1,
            drivers: 2,
            policy: MatchingPolicyKind::default(),
            geocode: GeocodeProviderKind::Disabled,
            geocode_timeout_ms: 1_000,
            geocode_queue_capacity: 64,
        }
    }
}

impl TestWorldConfig {
    pub fn with_riders(mut self, riders: usize) -> Self {
        self.riders = riders;
        self
    }

    pub fn with_drivers(mut self, drivers: usize) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_policy(mut self, policy: MatchingPolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_static_geocoding(mut self) -> Self {
        self.geocode = GeocodeProviderKind::Static;
        self
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_matching_policy(self.policy)
            .with_geocode_provider(self.geocode.clone())
            .with_geocode_timeout_ms(self.geocode_timeout_ms)
            .with_geocode_queue_capacity(self.geocode_queue_capacity)
    }

    /// Riders are registered before drivers, so driver ids are all larger
    /// than rider ids and ascend in registration order.
    pub fn build(&self) -> Seeded {
        let world = TestWorld::new(&self.engine_config());
        let riders = (0..self.riders)
            .map(|i| world.rider(&format!("rider-{i}")))
            .collect();
        let drivers = world.drivers("driver", self.drivers);
        Seeded {
            world,
            riders,
            drivers,
        }
    }
}

pub struct Seeded {
    pub world: TestWorld,
    pub riders: Vec<UserId>,
    pub drivers: Vec<UserId>,
}

impl Seeded {
    pub fn rider(&self) -> UserId {
        self.riders[0]
    }
}
