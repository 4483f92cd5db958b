use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

use crate::error::GeocodeError;

const ZIPPOPOTAM_URL: &str = "https://api.zippopotam.us/us";

/// Result of resolving a ZIP code.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: String,
    pub state_abbr: Option<String>,
}

/// Resolves postal codes to coordinates; used only during setup.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn resolve(&self, zip_code: &str) -> Result<Place, GeocodeError>;
}

/// Keyless US ZIP lookup via zippopotam.us.
#[derive(Debug, Clone)]
pub struct ZippopotamGeocoder {
    http: Client,
    base_url: String,
}

impl ZippopotamGeocoder {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to build HTTP client: {err}"))?;

        Ok(Self { http, base_url: ZIPPOPOTAM_URL.to_string() })
    }
}

#[async_trait]
impl Geocoder for ZippopotamGeocoder {
    async fn resolve(&self, zip_code: &str) -> Result<Place, GeocodeError> {
        let zip = zip_code.trim();
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), zip);
        debug!("Geocoding ZIP {zip}");

        let res = self.http.get(url).send().await?;
        let status = res.status();

        if status == StatusCode::NOT_FOUND {
            return Err(GeocodeError::NotFound(zip.to_string()));
        }
        if !status.is_success() {
            return Err(GeocodeError::Transient(format!("lookup failed with status {status}")));
        }

        let body = res.text().await?;
        parse_place(zip, &body)
    }
}

/// Extract the first place from a zippopotam.us response.
pub fn parse_place(zip: &str, body: &str) -> Result<Place, GeocodeError> {
    let parsed: ZpResponse = serde_json::from_str(body)
        .map_err(|err| GeocodeError::Parse(format!("invalid lookup JSON: {err}")))?;

    let place = parsed
        .places
        .into_iter()
        .next()
        .ok_or_else(|| GeocodeError::NotFound(zip.to_string()))?;

    let latitude = place
        .latitude
        .parse::<f64>()
        .map_err(|_| GeocodeError::Parse(format!("latitude '{}' is not a number", place.latitude)))?;
    let longitude = place.longitude.parse::<f64>().map_err(|_| {
        GeocodeError::Parse(format!("longitude '{}' is not a number", place.longitude))
    })?;

    Ok(Place {
        latitude,
        longitude,
        city_name: place.place_name,
        state_abbr: place.state_abbreviation.filter(|s| !s.is_empty()),
    })
}

#[derive(Debug, Deserialize)]
struct ZpPlace {
    #[serde(rename = "place name")]
    place_name: String,
    latitude: String,
    longitude: String,
    #[serde(rename = "state abbreviation")]
    state_abbreviation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZpResponse {
    #[serde(default)]
    places: Vec<ZpPlace>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_place() {
        let body = r#"{
            "post code": "62701",
            "country": "United States",
            "places": [{
                "place name": "Springfield",
                "longitude": "-89.6440",
                "state": "Illinois",
                "state abbreviation": "IL",
                "latitude": "39.7990"
            }]
        }"#;

        let place = parse_place("62701", body).expect("place");
        assert_eq!(place.city_name, "Springfield");
        assert_eq!(place.state_abbr.as_deref(), Some("IL"));
        assert!((place.latitude - 39.799).abs() < 1e-9);
        assert!((place.longitude + 89.644).abs() < 1e-9);
    }

    #[test]
    fn empty_places_is_not_found() {
        let err = parse_place("00000", r#"{ "places": [] }"#).unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound(zip) if zip == "00000"));
    }

    #[test]
    fn bad_coordinates_are_parse_errors() {
        let body = r#"{ "places": [{ "place name": "X", "latitude": "north", "longitude": "1" }] }"#;
        assert!(matches!(parse_place("12345", body), Err(GeocodeError::Parse(_))));
    }
}
