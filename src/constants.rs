//! Stable application-wide constants.
//!
//! Values here are structural limits, unit conversions, and default
//! fallbacks for env-var-based configuration. They should rarely change.
//! Anything an operator is expected to tune lives in
//! [`Config`](crate::config::Config) or [`ClientConfig`](crate::config::ClientConfig).

// --- Server defaults (used when HOST / PORT env vars are absent) ---

/// Default bind address for the HTTP server.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port for the HTTP server.
pub const DEFAULT_PORT: &str = "5000";
/// Default SQLite database, created on first start.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://bizmap.db?mode=rwc";
/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "bizmap-api";

// --- Geometry ---

/// Mean Earth radius in meters, used by the Haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Meters per degree of latitude on the Haversine sphere.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
/// Relative slack added to nearby-search prefilter boxes.
pub const PREFILTER_MARGIN: f64 = 0.01;
/// Two records closer than this (in degrees on both axes) with the same
/// name and category are treated as the same place during ingestion.
pub const DUPLICATE_LOCATION_EPSILON_DEG: f64 = 0.001;

// --- Default region: the Maltese islands (south, west, north, east) ---

pub const DEFAULT_REGION_SOUTH: f64 = 35.8;
pub const DEFAULT_REGION_WEST: f64 = 14.18;
pub const DEFAULT_REGION_NORTH: f64 = 35.95;
pub const DEFAULT_REGION_EAST: f64 = 14.58;
pub const DEFAULT_CENTER_LAT: f64 = 35.8989;
pub const DEFAULT_CENTER_LNG: f64 = 14.5146;
pub const DEFAULT_MAP_ZOOM: u8 = 11;

// --- Pagination / query limits ---

/// Page size used when a list request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page the `/api/stores` endpoints will return.
pub const MAX_STORE_PAGE_SIZE: u32 = 100;
/// Largest page the `/api/businesses` endpoint will return.
pub const MAX_BUSINESS_PAGE_SIZE: u32 = 200;
/// Default and maximum result count for `/api/stores/nearby`.
pub const DEFAULT_NEARBY_LIMIT: u32 = 20;
pub const MAX_NEARBY_LIMIT: u32 = 50;
/// Default and maximum radius (meters) for nearby queries.
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 5_000.0;
pub const MAX_NEARBY_RADIUS_M: f64 = 25_000.0;
/// Accepted radius range for filtered searches (meters).
pub const MIN_SEARCH_RADIUS_M: f64 = 100.0;
pub const MAX_SEARCH_RADIUS_M: f64 = 50_000.0;

// --- Ingestion ---

/// Default TTL (seconds) for cached Overpass results. Overridden by `INGEST_CACHE_TTL`.
pub const DEFAULT_INGEST_CACHE_TTL_SECONDS: u64 = 3_600;
/// One entry per category is all the ingest cache ever holds.
pub const INGEST_CACHE_MAX_ENTRIES: u64 = 64;
/// Maximum records accepted from one category fetch. Overridden by `INGEST_LIMIT`.
pub const DEFAULT_INGEST_LIMIT: usize = 500;
/// Server-side timeout hint embedded in Overpass QL, and the HTTP timeout for it.
pub const OVERPASS_QUERY_TIMEOUT_SECONDS: u64 = 60;
/// Retries for a single Overpass query (3 total attempts).
pub const OVERPASS_RETRY_MAX_ATTEMPTS: usize = 2;
/// Upper bound on random jitter added to each retry backoff.
pub const OVERPASS_RETRY_JITTER_MS: u64 = 250;
pub const OVERPASS_HTTP_TOO_MANY_REQUESTS: u16 = 429;
pub const OVERPASS_HTTP_GATEWAY_TIMEOUT: u16 = 504;
pub const USER_AGENT: &str = concat!("bizmap/", env!("CARGO_PKG_VERSION"));

// --- Client defaults ---

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
/// Network budget for one API call before it fails with a timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Quiet period before free-text search input triggers a fetch.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;
/// Delay between triggering a backend refresh and re-fetching the list.
pub const DEFAULT_REFRESH_REFETCH_DELAY_MS: u64 = 3_000;
/// Budget for a single location lookup.
pub const DEFAULT_GEOLOCATION_TIMEOUT_SECS: u64 = 10;
