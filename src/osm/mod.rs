//! OSM element-to-business mapping.
//!
//! Converts raw Overpass elements (nodes, ways, relations with their tags)
//! into [`NewBusiness`] records for a given [`BusinessCategory`].

use serde::Deserialize;
use std::collections::HashMap;

use crate::models::{BoundingBox, BusinessCategory, Coordinates, NewBusiness};

// ---------------------------------------------------------------------------
// Overpass element types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub center: Option<GeometryPoint>,
    #[serde(default)]
    pub geometry: Option<Vec<GeometryPoint>>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeometryPoint {
    pub lat: f64,
    pub lon: f64,
}

impl OverpassElement {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First non-empty value among `keys`
    fn tag_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.tag(k)).map(str::to_string)
    }

    /// Node position, else the `center` Overpass computed, else the
    /// centroid of the returned geometry.
    pub fn position(&self) -> Option<Coordinates> {
        let (lat, lon) = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => match (self.center, self.geometry.as_deref()) {
                (Some(center), _) => (center.lat, center.lon),
                (None, Some(geometry)) => calculate_centroid(geometry)?,
                (None, None) => return None,
            },
        };
        Coordinates::new(lat, lon).ok()
    }

    /// Stable external reference, e.g. `osm_node_123456`
    pub fn place_id(&self) -> String {
        format!("osm_{}_{}", self.element_type, self.id)
    }
}

/// Arithmetic mean of the geometry points
pub fn calculate_centroid(geometry: &[GeometryPoint]) -> Option<(f64, f64)> {
    if geometry.is_empty() {
        return None;
    }

    let count = geometry.len() as f64;
    let (lat_sum, lon_sum) = geometry
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));

    Some((lat_sum / count, lon_sum / count))
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// `"<housenumber> <street>, <city|locality>, <postcode>"` from `addr:*`
/// tags, with whatever parts exist. Falls back to the rounded coordinates.
pub fn build_address(tags: &HashMap<String, String>, position: &Coordinates) -> String {
    let get = |key: &str| tags.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    let mut parts = Vec::new();

    match (get("addr:housenumber"), get("addr:street")) {
        (Some(number), Some(street)) => parts.push(format!("{} {}", number, street)),
        (None, Some(street)) => parts.push(street.to_string()),
        _ => {}
    }
    if let Some(city) = get("addr:city").or_else(|| get("addr:locality")) {
        parts.push(city.to_string());
    }
    if let Some(postcode) = get("addr:postcode") {
        parts.push(postcode.to_string());
    }

    if parts.is_empty() {
        format!("({:.4}, {:.4})", position.lat, position.lng)
    } else {
        parts.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Business types
// ---------------------------------------------------------------------------

/// Finer-grained type labels within a category. Never empty: falls back
/// to the category name.
pub fn business_types(tags: &HashMap<String, String>, category: BusinessCategory) -> Vec<String> {
    let get = |key: &str| tags.get(key).map(String::as_str);

    let specific = match category {
        BusinessCategory::Grocery => match get("shop") {
            Some("supermarket") => Some("supermarket".to_string()),
            Some("grocery") | Some("greengrocer") => Some("grocery_store".to_string()),
            Some("convenience") => Some("convenience_store".to_string()),
            _ => None,
        },
        BusinessCategory::Companies => match (get("amenity"), get("office")) {
            (Some("bank"), _) => Some("bank".to_string()),
            (_, Some(office)) => Some(format!("office_{}", office)),
            _ => None,
        },
        BusinessCategory::Government => match (get("amenity"), get("government")) {
            (Some(amenity), _) => Some(amenity.to_string()),
            (_, Some(kind)) => Some(format!("government_{}", kind)),
            _ => None,
        },
        BusinessCategory::Education => match get("amenity") {
            Some(a @ ("university" | "college" | "school" | "kindergarten")) => Some(a.to_string()),
            _ => None,
        },
        BusinessCategory::Religion => match get("religion") {
            Some(religion) => Some(format!("{}_place_of_worship", religion)),
            None => Some("place_of_worship".to_string()),
        },
        BusinessCategory::Medical => match (get("amenity"), get("healthcare")) {
            (Some(a @ ("hospital" | "clinic" | "doctors")), _) => Some(a.to_string()),
            (_, Some(healthcare)) => Some(format!("healthcare_{}", healthcare)),
            _ => None,
        },
        BusinessCategory::Pharmacy => Some("pharmacy".to_string()),
    };

    vec![specific.unwrap_or_else(|| category.to_string())]
}

// ---------------------------------------------------------------------------
// Element conversion
// ---------------------------------------------------------------------------

/// Convert an element into a record, or `None` when it has no name, no
/// usable position, or lies outside `region`.
pub fn element_to_business(
    element: &OverpassElement,
    category: BusinessCategory,
    region: &BoundingBox,
) -> Option<NewBusiness> {
    let name = element.tag("name")?.to_string();
    let position = element.position()?;
    if !region.contains(&position) {
        return None;
    }

    let mut business = NewBusiness::new(element.place_id(), name, category, position);
    business.formatted_address = Some(build_address(&element.tags, &position));
    business.phone_number = element.tag_any(&["phone", "contact:phone"]);
    business.website = element.tag_any(&["website", "contact:website"]);
    business.email = element.tag_any(&["email", "contact:email"]);
    business.opening_hours = element.tag_any(&["opening_hours"]);
    business.business_types = business_types(&element.tags, category);
    business.brand = element.tag_any(&["brand"]);
    business.operator = element.tag_any(&["operator"]);
    business.osm_type = Some(element.element_type.clone());
    business.business_status = Some("OPERATIONAL".to_string());

    Some(business)
}

/// Convert a whole response, keeping one record per `place_id`, sorted by
/// name and capped at `limit`.
pub fn elements_to_businesses(
    elements: &[OverpassElement],
    category: BusinessCategory,
    region: &BoundingBox,
    limit: usize,
) -> Vec<NewBusiness> {
    let mut seen = std::collections::HashSet::new();
    let mut businesses: Vec<NewBusiness> = elements
        .iter()
        .filter_map(|e| element_to_business(e, category, region))
        .filter(|b| seen.insert(b.place_id.clone()))
        .collect();

    businesses.sort_by_key(|b| b.name.to_lowercase());
    businesses.truncate(limit);
    businesses
}
