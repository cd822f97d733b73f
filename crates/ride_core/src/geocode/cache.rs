use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use h3o::Resolution;
use lru::LruCache;

use crate::spatial::GeoPoint;

use super::{GeocodeError, ReverseGeocoder};

/// Memoizes another geocoder per H3 cell.
///
/// Only answered lookups are cached; failures go back to the inner geocoder
/// next time.
pub struct CachedGeocoder<G> {
    inner: G,
    resolution: Resolution,
    cache: Mutex<LruCache<h3o::CellIndex, Option<String>>>,
}

impl<G: ReverseGeocoder> CachedGeocoder<G> {
    pub fn new(inner: G, capacity: NonZeroUsize, resolution: Resolution) -> Self {
        Self {
            inner,
            resolution,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<h3o::CellIndex, Option<String>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<G: ReverseGeocoder> ReverseGeocoder for CachedGeocoder<G> {
    fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        let cell = point.to_cell(self.resolution)?;
        if let Some(hit) = self.lock().get(&cell) {
            return Ok(hit.clone());
        }

        // Not holding the cache lock across a possibly slow lookup.
        let answer = self.inner.reverse_geocode(point)?;
        self.lock().put(cell, answer.clone());
        Ok(answer)
    }
}
