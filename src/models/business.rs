use crate::models::{Coordinates, DistanceKm};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusinessCategory {
    #[default]
    Grocery,
    Companies,
    Government,
    Education,
    Religion,
    Medical,
    Pharmacy,
}

impl BusinessCategory {
    pub const ALL: [BusinessCategory; 7] = [
        BusinessCategory::Grocery,
        BusinessCategory::Companies,
        BusinessCategory::Government,
        BusinessCategory::Education,
        BusinessCategory::Religion,
        BusinessCategory::Medical,
        BusinessCategory::Pharmacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessCategory::Grocery => "grocery",
            BusinessCategory::Companies => "companies",
            BusinessCategory::Government => "government",
            BusinessCategory::Education => "education",
            BusinessCategory::Religion => "religion",
            BusinessCategory::Medical => "medical",
            BusinessCategory::Pharmacy => "pharmacy",
        }
    }

    /// Human-readable label shown in category pickers
    pub fn display_name(&self) -> &'static str {
        match self {
            BusinessCategory::Grocery => "Grocery Stores & Supermarkets",
            BusinessCategory::Companies => "Companies & Offices",
            BusinessCategory::Government => "Government Offices",
            BusinessCategory::Education => "Education Institutions",
            BusinessCategory::Religion => "Churches & Religious Sites",
            BusinessCategory::Medical => "Hospitals & Medical Centers",
            BusinessCategory::Pharmacy => "Pharmacies",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            BusinessCategory::Grocery => "🛒",
            BusinessCategory::Companies => "🏢",
            BusinessCategory::Government => "🏛️",
            BusinessCategory::Education => "🎓",
            BusinessCategory::Religion => "⛪",
            BusinessCategory::Medical => "🏥",
            BusinessCategory::Pharmacy => "💊",
        }
    }

    /// Overpass QL tag filters selecting this category. Each entry is
    /// combined with a `["name"]` requirement and the region bbox.
    pub fn overpass_selectors(&self) -> &'static [&'static str] {
        match self {
            BusinessCategory::Grocery => &[r#"["shop"~"^(supermarket|grocery|convenience|greengrocer)$"]"#],
            BusinessCategory::Companies => &[r#"["office"]["office"!="government"]"#, r#"["amenity"="bank"]"#],
            BusinessCategory::Government => &[
                r#"["office"="government"]"#,
                r#"["amenity"~"^(townhall|courthouse|police|post_office)$"]"#,
            ],
            BusinessCategory::Education => {
                &[r#"["amenity"~"^(university|college|school|kindergarten)$"]"#]
            }
            BusinessCategory::Religion => &[r#"["amenity"="place_of_worship"]"#],
            BusinessCategory::Medical => &[
                r#"["amenity"~"^(hospital|clinic|doctors)$"]"#,
                r#"["healthcare"]["healthcare"!="pharmacy"]"#,
            ],
            BusinessCategory::Pharmacy => &[r#"["amenity"="pharmacy"]"#],
        }
    }
}

impl fmt::Display for BusinessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BusinessCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        BusinessCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Invalid category: {}. Available: {}",
                    s,
                    BusinessCategory::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

/// A business or store as served by the directory API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: i64,
    /// External reference, e.g. `osm_node_123456`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: BusinessCategory,
    pub formatted_address: Option<String>,
    pub phone_number: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    /// 0-5
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    /// 0 (free) to 4 (very expensive)
    pub price_level: Option<u8>,
    pub business_status: Option<String>,
    #[serde(default)]
    pub permanently_closed: bool,
    /// Opening hours as published by the source, e.g. `Mo-Sa 08:00-20:00`
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub business_types: Vec<String>,
    pub brand: Option<String>,
    pub operator: Option<String>,
    /// `node`, `way` or `relation` for records ingested from OpenStreetMap
    #[serde(default)]
    pub osm_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_verified: Option<OffsetDateTime>,
    /// Filled in by nearby queries only; never stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl Business {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.latitude,
            lng: self.longitude,
        }
    }

    /// Annotate with the distance from `origin`, rounded to 10 m.
    pub fn with_distance_from(mut self, origin: &Coordinates) -> Self {
        let km = DistanceKm(origin.distance_to(&self.coordinates()));
        self.distance_km = Some(km.rounded().as_km());
        self
    }

    /// An operating business has not closed down for good
    pub fn is_operational(&self) -> bool {
        !self.permanently_closed
            && self
                .business_status
                .as_deref()
                .map_or(true, |s| s.eq_ignore_ascii_case("operational"))
    }

    /// Case-insensitive substring match on name or address
    pub fn matches_text(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        needle.is_empty()
            || search_key(&self.name, self.formatted_address.as_deref()).contains(&needle)
    }
}

/// Unicode-lowercased name and address, the text free-text queries are
/// matched against. A unit separator keeps a match from spanning both.
pub fn search_key(name: &str, address: Option<&str>) -> String {
    let mut key = name.trim().to_lowercase();
    if let Some(address) = address {
        key.push('\u{1f}');
        key.push_str(&address.to_lowercase());
    }
    key
}

fn validate_common(
    name: Option<&str>,
    rating: Option<f64>,
    price_level: Option<u8>,
) -> Result<(), String> {
    if let Some(name) = name {
        let len = name.trim().chars().count();
        if len == 0 || len > MAX_NAME_LENGTH {
            return Err(format!(
                "name must be between 1 and {} characters",
                MAX_NAME_LENGTH
            ));
        }
    }
    if let Some(rating) = rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err("rating must be between 0 and 5".to_string());
        }
    }
    if let Some(price_level) = price_level {
        if price_level > 4 {
            return Err("price_level must be between 0 and 4".to_string());
        }
    }
    Ok(())
}

/// Payload for creating a record (also produced by ingestion).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBusiness {
    pub place_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub category: BusinessCategory,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub user_ratings_total: Option<u32>,
    #[serde(default)]
    pub price_level: Option<u8>,
    #[serde(default)]
    pub business_status: Option<String>,
    #[serde(default)]
    pub permanently_closed: bool,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub business_types: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub osm_type: Option<String>,
}

impl NewBusiness {
    /// Minimal record with everything optional left empty
    pub fn new(
        place_id: impl Into<String>,
        name: impl Into<String>,
        category: BusinessCategory,
        coordinates: Coordinates,
    ) -> Self {
        NewBusiness {
            place_id: place_id.into(),
            name: name.into(),
            latitude: coordinates.lat,
            longitude: coordinates.lng,
            category,
            formatted_address: None,
            phone_number: None,
            website: None,
            email: None,
            rating: None,
            user_ratings_total: None,
            price_level: None,
            business_status: None,
            permanently_closed: false,
            opening_hours: None,
            business_types: Vec::new(),
            brand: None,
            operator: None,
            osm_type: None,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.latitude,
            lng: self.longitude,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.place_id.trim().is_empty() {
            return Err("place_id must not be empty".to_string());
        }
        Coordinates::new(self.latitude, self.longitude)?;
        validate_common(Some(&self.name), self.rating, self.price_level)
    }
}

/// Partial update; only fields that are present are changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BusinessUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<BusinessCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ratings_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanently_closed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_types: Option<Vec<String>>,
}

impl BusinessUpdate {
    pub fn validate(&self) -> Result<(), String> {
        validate_common(self.name.as_deref(), self.rating, self.price_level)
    }

    pub fn is_empty(&self) -> bool {
        *self == BusinessUpdate::default()
    }

    /// Apply the present fields onto an existing record
    pub fn apply_to(&self, business: &mut Business) {
        if let Some(ref name) = self.name {
            business.name = name.trim().to_string();
        }
        if let Some(category) = self.category {
            business.category = category;
        }
        if let Some(ref v) = self.formatted_address {
            business.formatted_address = Some(v.clone());
        }
        if let Some(ref v) = self.phone_number {
            business.phone_number = Some(v.clone());
        }
        if let Some(ref v) = self.website {
            business.website = Some(v.clone());
        }
        if let Some(ref v) = self.email {
            business.email = Some(v.clone());
        }
        if let Some(v) = self.rating {
            business.rating = Some(v);
        }
        if let Some(v) = self.user_ratings_total {
            business.user_ratings_total = Some(v);
        }
        if let Some(v) = self.price_level {
            business.price_level = Some(v);
        }
        if let Some(ref v) = self.business_status {
            business.business_status = Some(v.clone());
        }
        if let Some(v) = self.permanently_closed {
            business.permanently_closed = v;
        }
        if let Some(ref v) = self.opening_hours {
            business.opening_hours = Some(v.clone());
        }
        if let Some(ref v) = self.business_types {
            business.business_types = v.clone();
        }
    }
}
