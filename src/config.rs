use crate::constants::*;
use crate::models::{BoundingBox, Coordinates};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapProviderKind {
    #[default]
    OpenStreetMap, // Free tiles + Nominatim geocoding, no token required
    Mapbox,
}

impl FromStr for MapProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "osm" | "openstreetmap" | "leaflet" => Ok(MapProviderKind::OpenStreetMap),
            "mapbox" => Ok(MapProviderKind::Mapbox),
            _ => Err(format!(
                "Invalid map provider: {}. Use 'osm' or 'mapbox'",
                s
            )),
        }
    }
}

/// Read `key` from the environment, falling back to `default`, and parse it.
fn env_parse<T: FromStr>(key: &str, default: impl ToString) -> Result<T, String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| format!("Invalid {}", key))
}

/// Parse a comma-separated list of exactly `N` floats.
fn parse_floats<const N: usize>(key: &str, raw: &str) -> Result<[f64; N], String> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("Invalid {}: expected {} comma-separated numbers", key, N))?;

    values
        .try_into()
        .map_err(|_| format!("Invalid {}: expected {} comma-separated numbers", key, N))
}

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Overrides the built-in Overpass endpoint rotation when set
    pub overpass_url: Option<String>,
    /// Area that ingestion is restricted to
    pub region: BoundingBox,
    pub ingest_cache_ttl: u64,
    pub ingest_limit: usize,
    /// Empty means any origin is allowed
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        let region = match env::var("REGION_BOUNDS") {
            Ok(raw) => {
                let [south, west, north, east] = parse_floats::<4>("REGION_BOUNDS", &raw)?;
                BoundingBox::new(south, north, west, east)?
            }
            Err(_) => BoundingBox::default_region(),
        };

        let ingest_limit: usize = env_parse("INGEST_LIMIT", DEFAULT_INGEST_LIMIT)?;
        if ingest_limit == 0 {
            return Err("INGEST_LIMIT must be greater than 0".to_string());
        }

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env_parse("PORT", DEFAULT_PORT)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            overpass_url: env::var("OVERPASS_URL").ok().filter(|s| !s.trim().is_empty()),
            region,
            ingest_cache_ttl: env_parse("INGEST_CACHE_TTL", DEFAULT_INGEST_CACHE_TTL_SECONDS)?,
            ingest_limit,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client-side configuration: where the API lives and how the map view
/// behaves. Read once at startup.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub map_provider: MapProviderKind,
    pub mapbox_token: Option<String>,
    pub default_center: Coordinates,
    pub default_zoom: u8,
    /// Radius (meters) used for "near me" when the user picks none
    pub default_radius_m: f64,
    pub max_radius_m: f64,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub refresh_refetch_delay_ms: u64,
    pub geolocation_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            map_provider: MapProviderKind::default(),
            mapbox_token: None,
            default_center: Coordinates {
                lat: DEFAULT_CENTER_LAT,
                lng: DEFAULT_CENTER_LNG,
            },
            default_zoom: DEFAULT_MAP_ZOOM,
            default_radius_m: DEFAULT_SEARCH_RADIUS_M,
            max_radius_m: MAX_NEARBY_RADIUS_M,
            debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_refetch_delay_ms: DEFAULT_REFRESH_REFETCH_DELAY_MS,
            geolocation_timeout_secs: DEFAULT_GEOLOCATION_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let default_center = match env::var("MAP_DEFAULT_CENTER") {
            Ok(raw) => {
                let [lat, lng] = parse_floats::<2>("MAP_DEFAULT_CENTER", &raw)?;
                Coordinates::new(lat, lng)?
            }
            Err(_) => defaults.default_center,
        };

        let config = ClientConfig {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or(defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            map_provider: env::var("MAP_PROVIDER")
                .unwrap_or_else(|_| "osm".to_string())
                .parse()?,
            mapbox_token: env::var("MAPBOX_TOKEN").ok().filter(|s| !s.trim().is_empty()),
            default_center,
            default_zoom: env_parse("MAP_DEFAULT_ZOOM", defaults.default_zoom)?,
            default_radius_m: env_parse("DEFAULT_SEARCH_RADIUS_M", defaults.default_radius_m)?,
            max_radius_m: env_parse("MAX_SEARCH_RADIUS_M", defaults.max_radius_m)?,
            debounce_ms: env_parse("SEARCH_DEBOUNCE_MS", defaults.debounce_ms)?,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            refresh_refetch_delay_ms: env_parse(
                "REFRESH_REFETCH_DELAY_MS",
                defaults.refresh_refetch_delay_ms,
            )?,
            geolocation_timeout_secs: env_parse(
                "GEOLOCATION_TIMEOUT_SECS",
                defaults.geolocation_timeout_secs,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_zoom > 19 {
            return Err("MAP_DEFAULT_ZOOM must be between 0 and 19".to_string());
        }
        if self.default_radius_m <= 0.0 || self.max_radius_m <= 0.0 {
            return Err("Search radii must be positive".to_string());
        }
        if self.default_radius_m > self.max_radius_m {
            return Err(
                "DEFAULT_SEARCH_RADIUS_M must not exceed MAX_SEARCH_RADIUS_M".to_string(),
            );
        }
        if self.request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT_SECS must be greater than 0".to_string());
        }
        if self.map_provider == MapProviderKind::Mapbox && self.mapbox_token.is_none() {
            return Err("MAPBOX_TOKEN must be set when MAP_PROVIDER=mapbox".to_string());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn refresh_refetch_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_refetch_delay_ms)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_secs(self.geolocation_timeout_secs)
    }

    /// Clamp a user-chosen radius into the configured bounds.
    pub fn clamp_radius(&self, radius_m: f64) -> f64 {
        radius_m.clamp(MIN_SEARCH_RADIUS_M.min(self.max_radius_m), self.max_radius_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CLIENT_VARS: &[&str] = &[
        "API_BASE_URL",
        "MAP_PROVIDER",
        "MAPBOX_TOKEN",
        "MAP_DEFAULT_CENTER",
        "MAP_DEFAULT_ZOOM",
        "DEFAULT_SEARCH_RADIUS_M",
        "MAX_SEARCH_RADIUS_M",
        "SEARCH_DEBOUNCE_MS",
        "REQUEST_TIMEOUT_SECS",
    ];

    fn clear_client_env() {
        for key in CLIENT_VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_map_provider_parsing() {
        assert_eq!(
            "osm".parse::<MapProviderKind>().unwrap(),
            MapProviderKind::OpenStreetMap
        );
        assert_eq!(
            "MAPBOX".parse::<MapProviderKind>().unwrap(),
            MapProviderKind::Mapbox
        );
        assert!("google".parse::<MapProviderKind>().is_err());
    }

    #[test]
    fn test_parse_floats() {
        assert_eq!(
            parse_floats::<2>("X", "35.9, 14.5").unwrap(),
            [35.9, 14.5]
        );
        assert!(parse_floats::<2>("X", "35.9").is_err());
        assert!(parse_floats::<2>("X", "a,b").is_err());
    }

    #[test]
    #[serial]
    fn test_client_config_defaults() {
        clear_client_env();
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.map_provider, MapProviderKind::OpenStreetMap);
        assert_eq!(config.debounce_delay(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    #[serial]
    fn test_client_config_overrides() {
        clear_client_env();
        env::set_var("API_BASE_URL", "https://api.example.com/");
        env::set_var("MAP_DEFAULT_CENTER", "36.04,14.24");
        env::set_var("SEARCH_DEBOUNCE_MS", "250");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.default_center.lat, 36.04);
        assert_eq!(config.debounce_ms, 250);

        clear_client_env();
    }

    #[test]
    #[serial]
    fn test_mapbox_requires_token() {
        clear_client_env();
        env::set_var("MAP_PROVIDER", "mapbox");
        assert!(ClientConfig::from_env().is_err());

        env::set_var("MAPBOX_TOKEN", "pk.test");
        assert!(ClientConfig::from_env().is_ok());

        clear_client_env();
    }

    #[test]
    fn test_clamp_radius() {
        let config = ClientConfig::default();
        assert_eq!(config.clamp_radius(50.0), MIN_SEARCH_RADIUS_M);
        assert_eq!(config.clamp_radius(1_000_000.0), config.max_radius_m);
        assert_eq!(config.clamp_radius(2_000.0), 2_000.0);
    }
}
