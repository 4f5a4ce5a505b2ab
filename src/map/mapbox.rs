use crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::map::{fetch_json, MapError, MapProvider};
use crate::models::Coordinates;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const MAPBOX_API_BASE_URL: &str = "https://api.mapbox.com";
const MAPBOX_STYLE: &str = "mapbox/streets-v12";
const MAPBOX_ATTRIBUTION: &str = "© Mapbox © OpenStreetMap contributors";
const DIRECTIONS_PAGE_URL: &str = "https://www.google.com/maps/dir/";

/// How the provider authenticates with the geocoding API.
#[derive(Clone, Debug)]
pub enum AuthMode {
    /// Default: send `access_token` query param (direct Mapbox).
    DirectToken,
    /// Proxy mode: send `Authorization: Bearer` header.
    BearerHeader,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    features: Vec<GeocodingFeature>,
}

#[derive(Debug, Deserialize)]
struct GeocodingFeature {
    /// `[lng, lat]`
    center: [f64; 2],
}

/// Mapbox raster tiles and forward geocoding.
#[derive(Clone)]
pub struct MapboxProvider {
    client: Client,
    token: String,
    base_url: String,
    auth_mode: AuthMode,
    timeout: Duration,
}

impl MapboxProvider {
    pub fn new(token: String) -> Self {
        MapboxProvider {
            client: Client::new(),
            token,
            base_url: MAPBOX_API_BASE_URL.to_string(),
            auth_mode: AuthMode::DirectToken,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_config(token: String, base_url: String, auth_mode: AuthMode) -> Self {
        MapboxProvider {
            client: Client::new(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_mode,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Budget for one geocoding request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl MapProvider for MapboxProvider {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    fn tile_url(&self) -> String {
        format!(
            "{}/styles/v1/{}/tiles/{{z}}/{{x}}/{{y}}?access_token={}",
            MAPBOX_API_BASE_URL, MAPBOX_STYLE, self.token
        )
    }

    fn attribution(&self) -> &'static str {
        MAPBOX_ATTRIBUTION
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, MapError> {
        let url = format!(
            "{}/geocoding/v5/mapbox.places/{}.json",
            self.base_url,
            urlencoding::encode(query)
        );

        let mut request = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[("limit", "1")]);
        match self.auth_mode {
            AuthMode::DirectToken => {
                request = request.query(&[("access_token", &self.token)]);
            }
            AuthMode::BearerHeader => {
                request = request.bearer_auth(&self.token);
            }
        }

        let response: GeocodingResponse = fetch_json(request).await?;
        match response.features.first() {
            Some(feature) => {
                let [lng, lat] = feature.center;
                Coordinates::new(lat, lng)
                    .map(Some)
                    .map_err(MapError::Malformed)
            }
            None => {
                tracing::debug!("Mapbox geocoding found nothing for {:?}", query);
                Ok(None)
            }
        }
    }

    fn directions_url(&self, origin: Option<Coordinates>, destination: Coordinates) -> String {
        let mut url = format!(
            "{}?api=1&destination={},{}",
            DIRECTIONS_PAGE_URL, destination.lat, destination.lng
        );
        if let Some(origin) = origin {
            url.push_str(&format!("&origin={},{}", origin.lat, origin.lng));
        }
        url
    }
}
