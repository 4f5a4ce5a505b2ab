use crate::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::map::{fetch_json, MapError, MapProvider};
use crate::models::Coordinates;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";
const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const OSM_DIRECTIONS_URL: &str = "https://www.openstreetmap.org/directions";

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// OpenStreetMap tiles with Nominatim geocoding. Needs no token.
#[derive(Clone)]
pub struct OsmProvider {
    client: Client,
    geocoder_url: String,
    timeout: Duration,
}

impl OsmProvider {
    pub fn new() -> Self {
        Self::with_geocoder_url(NOMINATIM_BASE_URL)
    }

    /// Alternative Nominatim instance
    pub fn with_geocoder_url(url: impl Into<String>) -> Self {
        // Nominatim's usage policy requires an identifying User-Agent
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        OsmProvider {
            client,
            geocoder_url: url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Budget for one geocoding request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OsmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapProvider for OsmProvider {
    fn name(&self) -> &'static str {
        "osm"
    }

    fn tile_url(&self) -> String {
        OSM_TILE_URL.to_string()
    }

    fn attribution(&self) -> &'static str {
        OSM_ATTRIBUTION
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, MapError> {
        let request = self
            .client
            .get(format!("{}/search", self.geocoder_url))
            .timeout(self.timeout)
            .query(&[("q", query), ("format", "json"), ("limit", "1")]);

        let places: Vec<NominatimPlace> = fetch_json(request).await?;
        let Some(place) = places.first() else {
            tracing::debug!("Nominatim found nothing for {:?}", query);
            return Ok(None);
        };

        let lat = place
            .lat
            .parse::<f64>()
            .map_err(|e| MapError::Malformed(format!("lat: {}", e)))?;
        let lng = place
            .lon
            .parse::<f64>()
            .map_err(|e| MapError::Malformed(format!("lon: {}", e)))?;

        Coordinates::new(lat, lng).map(Some).map_err(MapError::Malformed)
    }

    fn directions_url(&self, origin: Option<Coordinates>, destination: Coordinates) -> String {
        let from = origin
            .map(|o| format!("{},{}", o.lat, o.lng))
            .unwrap_or_default();
        let route = format!("{};{},{}", from, destination.lat, destination.lng);
        format!("{}?route={}", OSM_DIRECTIONS_URL, urlencoding::encode(&route))
    }
}
