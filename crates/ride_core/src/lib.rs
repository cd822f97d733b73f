//! Ride lifecycle and driver-matching core.
//!
//! The crate owns the part of a ride-hailing backend where ordering and
//! contention matter: creating rides, assigning exactly one driver per ride,
//! moving rides through their lifecycle and keeping the set of assignable
//! drivers consistent with the rides they are committed to. HTTP, auth and
//! storage engines sit outside and talk to it through the traits exported
//! here.
//!
//! - [`identity`]: user roles and activity ([`IdentityRegistry`])
//! - [`store`]: ride records and the compare-and-update primitive ([`RideStore`])
//! - [`availability`]: eligible-driver index
//! - [`matching`]: deterministic driver selection and commit
//! - [`lifecycle`]: the ride state machine
//! - [`geocode`]: best-effort reverse geocoding side-channel
//! - [`engine`]: wiring of all of the above from an [`EngineConfig`]

pub mod assignment;
pub mod availability;
pub mod config;
pub mod engine;
pub mod error;
pub mod geocode;
pub mod identity;
pub mod lifecycle;
pub mod matching;
pub mod model;
pub mod spatial;
pub mod store;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use availability::{AvailabilityIndex, Candidate};
pub use config::{EngineConfig, GeocodeConfig, GeocodeProviderKind};
pub use engine::RideEngine;
pub use error::RideError;
pub use identity::{IdentityRegistry, InMemoryIdentityRegistry};
pub use lifecycle::RideStateMachine;
pub use matching::{MatchingEngine, MatchingPolicy, MatchingPolicyKind};
pub use model::{Ride, RideId, RideStatus, Role, User, UserId};
pub use spatial::GeoPoint;
pub use store::{InMemoryRideStore, RideStore};
pub use telemetry::{EngineTelemetry, TelemetrySnapshot};
