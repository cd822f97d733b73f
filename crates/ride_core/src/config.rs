//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! matching_policy = "longest_idle"
//!
//! [geocode]
//! queue_capacity = 512
//! timeout_ms = 2000
//! max_in_flight = 4
//! cache_capacity = 4096
//! cache_resolution = 7
//!
//! [geocode.provider]
//! kind = "static"
//! ```

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use h3o::Resolution;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geocode::{CachedGeocoder, ReverseGeocoder, StaticCityGeocoder, DEFAULT_MAX_IN_FLIGHT};
use crate::matching::MatchingPolicyKind;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_CACHE_RESOLUTION: u8 = 7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which reverse-geocoding backend feeds the city field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeocodeProviderKind {
    /// Location updates never produce a city.
    Disabled,
    /// Offline H3 city table, no network access.
    #[default]
    Static,
    /// Geoapify HTTP API.
    #[cfg(feature = "geoapify")]
    Geoapify {
        endpoint: Option<String>,
        api_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    pub provider: GeocodeProviderKind,
    /// Pending lookups beyond this are dropped.
    pub queue_capacity: usize,
    pub timeout_ms: u64,
    /// Lookups the worker resolves concurrently.
    pub max_in_flight: usize,
    /// 0 disables the per-cell cache.
    pub cache_capacity: usize,
    /// H3 resolution of cache keys (0-15); 7 is roughly 1.2 km cells.
    pub cache_resolution: u8,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            provider: GeocodeProviderKind::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_resolution: DEFAULT_CACHE_RESOLUTION,
        }
    }
}

impl GeocodeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "geocode.queue_capacity must be positive".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "geocode.timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "geocode.max_in_flight must be positive".to_string(),
            ));
        }
        Resolution::try_from(self.cache_resolution).map_err(|err| {
            ConfigError::Invalid(format!("geocode.cache_resolution: {err}"))
        })?;
        Ok(())
    }

    /// Build the configured geocoder, or `None` when geocoding is disabled.
    pub fn build_geocoder(&self) -> Result<Option<Arc<dyn ReverseGeocoder>>, ConfigError> {
        self.validate()?;
        match &self.provider {
            GeocodeProviderKind::Disabled => Ok(None),
            GeocodeProviderKind::Static => {
                let table = StaticCityGeocoder::with_default_cities()
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?;
                Ok(Some(self.wrap(table)?))
            }
            #[cfg(feature = "geoapify")]
            GeocodeProviderKind::Geoapify { endpoint, api_key } => {
                if api_key.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "geocode.provider.api_key must be set".to_string(),
                    ));
                }
                let client = crate::geocode::GeoapifyGeocoder::new(endpoint.as_deref(), api_key);
                Ok(Some(self.wrap(client)?))
            }
        }
    }

    fn wrap<G: ReverseGeocoder + 'static>(
        &self,
        geocoder: G,
    ) -> Result<Arc<dyn ReverseGeocoder>, ConfigError> {
        let Some(capacity) = NonZeroUsize::new(self.cache_capacity) else {
            return Ok(Arc::new(geocoder));
        };
        let resolution = Resolution::try_from(self.cache_resolution)
            .map_err(|err| ConfigError::Invalid(format!("geocode.cache_resolution: {err}")))?;
        Ok(Arc::new(CachedGeocoder::new(geocoder, capacity, resolution)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching_policy: MatchingPolicyKind,
    pub geocode: GeocodeConfig,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.geocode.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn with_matching_policy(mut self, policy: MatchingPolicyKind) -> Self {
        self.matching_policy = policy;
        self
    }

    pub fn with_geocode_provider(mut self, provider: GeocodeProviderKind) -> Self {
        self.geocode.provider = provider;
        self
    }

    pub fn with_geocode_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.geocode.timeout_ms = timeout_ms;
        self
    }

    pub fn with_geocode_queue_capacity(mut self, capacity: usize) -> Self {
        self.geocode.queue_capacity = capacity;
        self
    }

    pub fn with_geocode_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.geocode.max_in_flight = max_in_flight;
        self
    }

    pub fn without_geocode_cache(mut self) -> Self {
        self.geocode.cache_capacity = 0;
        self
    }
}
