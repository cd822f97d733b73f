//! Geoapify reverse-geocoding API.
//!
//! Response parsing is always compiled so it can be tested offline; the HTTP
//! client sits behind the `geoapify` feature.

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://api.geoapify.com";

/// Minimal Geoapify JSON response structures.
#[derive(Debug, Deserialize)]
pub struct ReverseResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    city: Option<String>,
}

impl ReverseResponse {
    /// City of the first feature, if it has a non-blank one.
    pub fn city(&self) -> Option<String> {
        self.features
            .first()
            .and_then(|feature| feature.properties.city.as_deref())
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .map(str::to_string)
    }
}

#[cfg(feature = "geoapify")]
mod client {
    use std::sync::OnceLock;
    use std::time::Duration;

    use reqwest::blocking::Client;
    use reqwest::Url;

    use crate::spatial::GeoPoint;

    use super::super::{GeocodeError, ReverseGeocoder};
    use super::{ReverseResponse, DEFAULT_ENDPOINT};

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Reverse geocoder calling the Geoapify HTTP API.
    ///
    /// The blocking client is built on first use, on the worker's blocking
    /// thread, never inside the async runtime.
    pub struct GeoapifyGeocoder {
        endpoint: String,
        api_key: String,
        client: OnceLock<Client>,
    }

    impl GeoapifyGeocoder {
        pub fn new(endpoint: Option<&str>, api_key: &str) -> Self {
            Self {
                endpoint: endpoint
                    .unwrap_or(DEFAULT_ENDPOINT)
                    .trim_end_matches('/')
                    .to_string(),
                api_key: api_key.to_string(),
                client: OnceLock::new(),
            }
        }

        fn client(&self) -> Result<&Client, GeocodeError> {
            if let Some(client) = self.client.get() {
                return Ok(client);
            }
            let built = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
            Ok(self.client.get_or_init(|| built))
        }
    }

    impl ReverseGeocoder for GeoapifyGeocoder {
        fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
            let mut url = Url::parse(&format!("{}/v1/geocode/reverse", self.endpoint))
                .map_err(|err| GeocodeError::Api(format!("failed to build Geoapify URL: {err}")))?;
            url.query_pairs_mut()
                .append_pair("lat", &point.latitude.to_string())
                .append_pair("lon", &point.longitude.to_string())
                .append_pair("apiKey", &self.api_key);

            let response = self.client()?.get(url).send()?.error_for_status()?;
            let parsed: ReverseResponse = response.json()?;
            Ok(parsed.city())
        }
    }
}

#[cfg(feature = "geoapify")]
pub use client::GeoapifyGeocoder;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> ReverseResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn extracts_city_from_first_feature() {
        let body = r#"{"features": [
            {"properties": {"city": "Berlin", "country": "Germany"}},
            {"properties": {"city": "Potsdam"}}
        ]}"#;
        assert_eq!(parse(body).city().as_deref(), Some("Berlin"));
    }

    #[test]
    fn missing_or_blank_city_is_none() {
        assert_eq!(parse(r#"{"features": []}"#).city(), None);
        assert_eq!(parse(r#"{}"#).city(), None);
        assert_eq!(parse(r#"{"features": [{"properties": {}}]}"#).city(), None);
        assert_eq!(
            parse(r#"{"features": [{"properties": {"city": "  "}}]}"#).city(),
            None
        );
    }
}
