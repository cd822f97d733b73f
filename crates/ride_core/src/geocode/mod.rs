//! Reverse geocoding: a best-effort side-channel that names the city a ride is in.
//!
//! Location updates never wait for a lookup. They enqueue a [`GeocodeJob`];
//! a tokio worker resolves it through a [`ReverseGeocoder`] with a timeout
//! and writes the city back (or [`UNKNOWN_CITY`] on a miss or failure).
//!
//! Providers, selectable via [`crate::config::GeocodeProviderKind`]:
//!
//! - **`StaticCityGeocoder`**: offline table of city areas on the H3 grid.
//! - **`GeoapifyGeocoder`** (feature `geoapify`): Geoapify reverse-geocoding API.
//!
//! Either can be wrapped in [`CachedGeocoder`], which memoizes answers per H3 cell.

pub mod cache;
pub mod geoapify;
pub mod static_table;
pub mod worker;

use thiserror::Error;

use crate::error::RideError;
use crate::spatial::GeoPoint;

pub use cache::CachedGeocoder;
pub use static_table::{CityArea, StaticCityGeocoder};
pub use worker::{
    geocode_channel, GeocodeJob, GeocodeQueue, GeocodeWorker, DEFAULT_MAX_IN_FLIGHT,
};

#[cfg(feature = "geoapify")]
pub use geoapify::GeoapifyGeocoder;

/// City recorded when a lookup misses, fails or times out.
pub const UNKNOWN_CITY: &str = "Unknown";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[cfg(feature = "geoapify")]
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoding service error: {0}")]
    Api(String),
    #[error(transparent)]
    Location(#[from] RideError),
}

/// Trait for reverse-geocoding backends. Lookups may block; the worker runs
/// them on the blocking pool.
pub trait ReverseGeocoder: Send + Sync {
    /// City containing `point`, or `None` if the backend has no answer.
    fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError>;
}
