use crate::constants::{DEFAULT_NEARBY_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_RADIUS_M};
use crate::models::{BusinessCategory, Coordinates};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Treat absent, empty and whitespace-only query values as "not given".
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

fn default_offset() -> u32 {
    0
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Search and filter constraints shared by the stores and businesses
/// endpoints. Radius is in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<BusinessCategory>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub radius: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub min_rating: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub max_price_level: Option<u8>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub exclude_closed: Option<bool>,
    #[serde(default = "default_offset", alias = "skip")]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for SearchFilters {
    fn default() -> Self {
        SearchFilters {
            query: None,
            category: None,
            latitude: None,
            longitude: None,
            radius: None,
            min_rating: None,
            max_price_level: None,
            exclude_closed: None,
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchFilters {
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_category(mut self, category: BusinessCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn near(mut self, center: Coordinates, radius_m: f64) -> Self {
        self.latitude = Some(center.lat);
        self.longitude = Some(center.lng);
        self.radius = Some(radius_m);
        self
    }

    pub fn page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Trimmed query text, or `None` when blank
    pub fn text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Both coordinates are needed for a distance search; a lone latitude
    /// or longitude is ignored.
    pub fn center(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    pub fn radius_or_default(&self) -> f64 {
        self.radius.unwrap_or(DEFAULT_SEARCH_RADIUS_M)
    }

    /// Query-string pairs for an outgoing request. Unset and blank values
    /// are left out entirely; pagination is always sent.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(query) = self.text() {
            pairs.push(("query", query.to_string()));
        }
        if let Some(category) = self.category {
            pairs.push(("category", category.to_string()));
        }
        if let Some(lat) = self.latitude {
            pairs.push(("latitude", lat.to_string()));
        }
        if let Some(lng) = self.longitude {
            pairs.push(("longitude", lng.to_string()));
        }
        if let Some(radius) = self.radius {
            pairs.push(("radius", radius.to_string()));
        }
        if let Some(min_rating) = self.min_rating {
            pairs.push(("min_rating", min_rating.to_string()));
        }
        if let Some(max_price) = self.max_price_level {
            pairs.push(("max_price_level", max_price.to_string()));
        }
        if let Some(exclude_closed) = self.exclude_closed {
            pairs.push(("exclude_closed", exclude_closed.to_string()));
        }
        pairs.push(("offset", self.offset.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

/// `skip`/`limit` window of `GET /api/stores`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_offset")]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        ListParams {
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

fn default_nearby_limit() -> u32 {
    DEFAULT_NEARBY_LIMIT
}

/// Parameters of `GET /api/stores/nearby`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearbyParams {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub radius: Option<f64>,
    #[serde(default = "default_nearby_limit")]
    pub limit: u32,
}

impl NearbyParams {
    pub fn new(center: Coordinates, radius_m: f64, limit: u32) -> Self {
        NearbyParams {
            latitude: center.lat,
            longitude: center.lng,
            radius: Some(radius_m),
            limit,
        }
    }
}
