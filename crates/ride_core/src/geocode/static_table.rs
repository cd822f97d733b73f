use h3o::{CellIndex, Resolution};

use crate::error::RideError;
use crate::spatial::GeoPoint;

use super::{GeocodeError, ReverseGeocoder};

/// Resolution of the offline table (~8.5 km cell edge).
pub const DEFAULT_TABLE_RESOLUTION: Resolution = Resolution::Five;

/// A city approximated as a disk of H3 cells around its centre.
#[derive(Debug, Clone)]
pub struct CityArea {
    pub name: String,
    pub center: CellIndex,
    pub radius_cells: u32,
}

/// Offline reverse geocoder over a fixed list of city areas.
///
/// A point resolves to the nearest city (by grid distance) whose disk
/// contains it; earlier entries win ties.
#[derive(Debug, Clone)]
pub struct StaticCityGeocoder {
    resolution: Resolution,
    cities: Vec<CityArea>,
}

impl StaticCityGeocoder {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            cities: Vec::new(),
        }
    }

    pub fn with_city(
        mut self,
        name: &str,
        longitude: f64,
        latitude: f64,
        radius_cells: u32,
    ) -> Result<Self, RideError> {
        let center = GeoPoint::new(longitude, latitude)?.to_cell(self.resolution)?;
        self.cities.push(CityArea {
            name: name.to_string(),
            center,
            radius_cells,
        });
        Ok(self)
    }

    /// A handful of large cities, enough for demos and tests.
    pub fn with_default_cities() -> Result<Self, RideError> {
        Self::new(DEFAULT_TABLE_RESOLUTION)
            .with_city("Berlin", 13.405, 52.52, 3)?
            .with_city("Paris", 2.3522, 48.8566, 2)?
            .with_city("London", -0.1276, 51.5072, 3)?
            .with_city("New York", -74.006, 40.7128, 3)?
            .with_city("San Francisco", -122.4194, 37.7749, 2)?
            .with_city("Nairobi", 36.8219, -1.2921, 2)?
            .with_city("Lagos", 3.3792, 6.5244, 3)?
            .with_city("Tokyo", 139.6917, 35.6895, 4)?
            .with_city("Sydney", 151.2093, -33.8688, 3)
    }

    pub fn cities(&self) -> &[CityArea] {
        &self.cities
    }

    fn lookup(&self, cell: CellIndex) -> Option<&CityArea> {
        let mut best: Option<(&CityArea, i32)> = None;
        for city in &self.cities {
            let Ok(distance) = city.center.grid_distance(cell) else {
                continue;
            };
            if distance < 0 || distance > city.radius_cells as i32 {
                continue;
            }
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((city, distance)),
            }
        }
        best.map(|(city, _)| city)
    }
}

impl ReverseGeocoder for StaticCityGeocoder {
    fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        let cell = point.to_cell(self.resolution)?;
        Ok(self.lookup(cell).map(|city| city.name.clone()))
    }
}
