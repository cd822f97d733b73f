//! Geographic points: validation, GeoJSON representation and H3 indexing.
//!
//! Locations arrive from clients as GeoJSON `Point` objects
//! (`{"type": "Point", "coordinates": [lng, lat]}`), sometimes wrapped in a
//! JSON string. [`GeoPoint`] is the validated form used throughout the crate;
//! H3 cells derived from it key the geocoding cache and the offline city table.

use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

use crate::error::RideError;

pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting coordinates outside the WGS84 ranges.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, RideError> {
        let point = Self {
            longitude,
            latitude,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), RideError> {
        if !self.longitude.is_finite()
            || self.longitude < LONGITUDE_RANGE.0
            || self.longitude > LONGITUDE_RANGE.1
        {
            return Err(RideError::InvalidLocation(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if !self.latitude.is_finite()
            || self.latitude < LATITUDE_RANGE.0
            || self.latitude > LATITUDE_RANGE.1
        {
            return Err(RideError::InvalidLocation(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        Ok(())
    }

    /// Parse a GeoJSON point given either as an object or as a string holding one.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self, RideError> {
        let parsed = match value {
            serde_json::Value::String(raw) => serde_json::from_str::<GeoPoint>(raw),
            other => serde_json::from_value::<GeoPoint>(other.clone()),
        };
        parsed.map_err(|err| RideError::InvalidLocation(err.to_string()))
    }

    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Point",
            "coordinates": [self.longitude, self.latitude],
        })
    }

    pub fn to_lat_lng(&self) -> Result<LatLng, RideError> {
        LatLng::new(self.latitude, self.longitude)
            .map_err(|err| RideError::InvalidLocation(err.to_string()))
    }

    pub fn to_cell(&self, resolution: Resolution) -> Result<CellIndex, RideError> {
        Ok(self.to_lat_lng()?.to_cell(resolution))
    }
}

/// Wire shape of a GeoJSON point.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<f64>,
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = RideError;

    fn try_from(raw: GeoJsonPoint) -> Result<Self, Self::Error> {
        if raw.kind != "Point" {
            return Err(RideError::InvalidLocation(format!(
                "expected a GeoJSON Point, got `{}`",
                raw.kind
            )));
        }
        match raw.coordinates.as_slice() {
            [longitude, latitude] => GeoPoint::new(*longitude, *latitude),
            _ => Err(RideError::InvalidLocation(
                "coordinates must contain [longitude, latitude]".to_string(),
            )),
        }
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: vec![point.longitude, point.latitude],
        }
    }
}
