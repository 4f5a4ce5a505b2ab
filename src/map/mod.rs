//! Map provider capability set.
//!
//! A [`MapProvider`] knows how to describe a map view (tile source,
//! attribution, viewport, markers), resolve place names and build external
//! directions links. Tiles themselves are drawn by the provider's servers.
//! The active provider is chosen once at startup from [`ClientConfig`].

pub mod mapbox;
pub mod osm;

pub use mapbox::{AuthMode, MapboxProvider};
pub use osm::OsmProvider;

use crate::config::{ClientConfig, MapProviderKind};
use crate::models::{BoundingBox, Business, BusinessCategory, Coordinates};
use async_trait::async_trait;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

const MAX_ZOOM: u8 = 18;
const SINGLE_POINT_ZOOM: u8 = 16;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("Map service request failed: {0}")]
    Network(String),

    #[error("Map service did not answer in time")]
    Timeout,

    #[error("Map service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Unexpected map service response: {0}")]
    Malformed(String),
}

fn transport_error(e: reqwest::Error) -> MapError {
    if e.is_timeout() {
        MapError::Timeout
    } else {
        MapError::Network(e.to_string())
    }
}

/// Send `request` and decode a JSON body.
pub(crate) async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, MapError> {
    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(MapError::Http {
            status: status.as_u16(),
            message,
        });
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            MapError::Timeout
        } else {
            MapError::Malformed(e.to_string())
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: Coordinates,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: i64,
    pub position: Coordinates,
    pub title: String,
    pub category: BusinessCategory,
    pub distance_km: Option<f64>,
}

impl Marker {
    pub fn for_business(business: &Business) -> Self {
        Marker {
            id: business.id,
            position: business.coordinates(),
            title: business.name.clone(),
            category: business.category,
            distance_km: business.distance_km,
        }
    }

    /// GeoJSON point; positions are `[lng, lat]`.
    fn to_feature(&self, selected: bool) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("title".to_string(), self.title.clone().into());
        properties.insert("category".to_string(), self.category.as_str().into());
        properties.insert("icon".to_string(), self.category.icon().into());
        properties.insert("selected".to_string(), selected.into());
        if let Some(distance) = self.distance_km {
            properties.insert("distance_km".to_string(), distance.into());
        }

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                self.position.lng,
                self.position.lat,
            ]))),
            id: Some(geojson::feature::Id::Number(self.id.into())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Provider-independent description of what the map shows.
#[derive(Debug, Clone, PartialEq)]
pub struct MapScene {
    pub viewport: Viewport,
    pub selected: Option<i64>,
    markers: BTreeMap<i64, Marker>,
}

impl MapScene {
    pub fn new(center: Coordinates, zoom: u8) -> Self {
        MapScene {
            viewport: Viewport { center, zoom },
            selected: None,
            markers: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.default_center, config.default_zoom)
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn marker(&self, id: i64) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Box around every marker
    pub fn marker_bounds(&self) -> Option<BoundingBox> {
        let points: Vec<Coordinates> = self.markers.values().map(|m| m.position).collect();
        BoundingBox::from_points(&points)
    }
}

/// Serializable output of [`MapProvider::render`].
#[derive(Debug, Clone, Serialize)]
pub struct RenderedMap {
    pub provider: &'static str,
    pub tile_url: String,
    pub attribution: &'static str,
    pub viewport: Viewport,
    pub markers: FeatureCollection,
}

/// Web-mercator zoom at which `bounds` roughly fills one 256px tile.
pub fn zoom_for_bounds(bounds: &BoundingBox) -> u8 {
    let span = (bounds.max_lat - bounds.min_lat).max(bounds.max_lng - bounds.min_lng);
    if span <= f64::EPSILON {
        return SINGLE_POINT_ZOOM;
    }
    let zoom = (360.0 / span).log2().floor();
    zoom.clamp(1.0, MAX_ZOOM as f64) as u8
}

#[async_trait]
pub trait MapProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// XYZ tile template with `{z}`, `{x}`, `{y}` placeholders
    fn tile_url(&self) -> String;

    fn attribution(&self) -> &'static str;

    /// First match for a free-form place name, `None` when nothing matched.
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, MapError>;

    /// External directions page to `destination`, from `origin` when known.
    fn directions_url(&self, origin: Option<Coordinates>, destination: Coordinates) -> String;

    fn render(&self, scene: &MapScene) -> RenderedMap {
        let features = scene
            .markers()
            .map(|m| m.to_feature(scene.selected == Some(m.id)))
            .collect();

        RenderedMap {
            provider: self.name(),
            tile_url: self.tile_url(),
            attribution: self.attribution(),
            viewport: scene.viewport,
            markers: FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            },
        }
    }

    /// Add or replace the marker with the same id.
    fn place_marker(&self, scene: &mut MapScene, marker: Marker) {
        scene.markers.insert(marker.id, marker);
    }

    fn remove_marker(&self, scene: &mut MapScene, id: i64) -> bool {
        if scene.selected == Some(id) {
            scene.selected = None;
        }
        scene.markers.remove(&id).is_some()
    }

    fn fit_bounds(&self, scene: &mut MapScene, bounds: &BoundingBox) {
        scene.viewport = Viewport {
            center: bounds.center(),
            zoom: zoom_for_bounds(bounds),
        };
    }
}

/// Replace the scene's markers with `businesses` and frame them.
pub fn show_businesses(provider: &dyn MapProvider, scene: &mut MapScene, businesses: &[Business]) {
    let stale: Vec<i64> = scene.markers().map(|m| m.id).collect();
    for id in stale {
        provider.remove_marker(scene, id);
    }
    for business in businesses {
        provider.place_marker(scene, Marker::for_business(business));
    }
    if let Some(bounds) = scene.marker_bounds() {
        provider.fit_bounds(scene, &bounds);
    }
}

pub fn provider_from_config(config: &ClientConfig) -> Result<Arc<dyn MapProvider>, String> {
    match config.map_provider {
        MapProviderKind::OpenStreetMap => Ok(Arc::new(OsmProvider::new())),
        MapProviderKind::Mapbox => {
            let token = config
                .mapbox_token
                .clone()
                .ok_or_else(|| "MAPBOX_TOKEN must be set when MAP_PROVIDER=mapbox".to_string())?;
            Ok(Arc::new(MapboxProvider::new(token)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn business(id: i64, name: &str, lat: f64, lng: f64) -> Business {
        Business {
            id,
            place_id: Some(format!("osm_node_{}", id)),
            name: name.to_string(),
            latitude: lat,
            longitude: lng,
            category: BusinessCategory::Pharmacy,
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
            business_types: vec!["pharmacy".to_string()],
            brand: None,
            operator: None,
            osm_type: Some("node".to_string()),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: None,
            last_verified: None,
            distance_km: Some(1.25),
        }
    }

    #[test]
    fn test_zoom_for_bounds() {
        let malta = BoundingBox::default_region();
        // 0.4 degrees wide
        assert_eq!(zoom_for_bounds(&malta), 9);

        let point = BoundingBox::new(35.9, 35.9, 14.5, 14.5).unwrap();
        assert_eq!(zoom_for_bounds(&point), SINGLE_POINT_ZOOM);

        let world = BoundingBox::new(-90.0, 90.0, -180.0, 180.0).unwrap();
        assert_eq!(zoom_for_bounds(&world), 1);
    }

    #[test]
    fn test_marker_lifecycle() {
        let provider = OsmProvider::new();
        let mut scene = MapScene::new(Coordinates::new(35.9, 14.5).unwrap(), 11);

        provider.place_marker(&mut scene, Marker::for_business(&business(1, "A", 35.9, 14.5)));
        provider.place_marker(&mut scene, Marker::for_business(&business(2, "B", 35.8, 14.4)));
        // Same id replaces
        provider.place_marker(&mut scene, Marker::for_business(&business(1, "A2", 35.9, 14.5)));
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.marker(1).unwrap().title, "A2");

        scene.selected = Some(2);
        assert!(provider.remove_marker(&mut scene, 2));
        assert!(!provider.remove_marker(&mut scene, 2));
        assert_eq!(scene.selected, None);
    }

    #[test]
    fn test_render_emits_geojson_points() {
        let provider = OsmProvider::new();
        let mut scene = MapScene::new(Coordinates::new(35.9, 14.5).unwrap(), 11);
        provider.place_marker(&mut scene, Marker::for_business(&business(7, "Remedies", 35.91, 14.49)));
        scene.selected = Some(7);

        let rendered = provider.render(&scene);
        assert_eq!(rendered.provider, "osm");
        assert_eq!(rendered.markers.features.len(), 1);

        let json = serde_json::to_value(&rendered).unwrap();
        let feature = &json["markers"]["features"][0];
        assert_eq!(feature["geometry"]["type"], "Point");
        assert_eq!(feature["geometry"]["coordinates"][0], 14.49);
        assert_eq!(feature["geometry"]["coordinates"][1], 35.91);
        assert_eq!(feature["id"], 7);
        assert_eq!(feature["properties"]["title"], "Remedies");
        assert_eq!(feature["properties"]["selected"], true);
        assert_eq!(feature["properties"]["distance_km"], 1.25);
        assert_eq!(json["markers"]["type"], "FeatureCollection");
    }

    #[test]
    fn test_show_businesses_replaces_and_frames() {
        let provider = OsmProvider::new();
        let mut scene = MapScene::new(Coordinates::new(0.0, 0.0).unwrap(), 3);
        provider.place_marker(&mut scene, Marker::for_business(&business(99, "Old", 10.0, 10.0)));

        let results = vec![business(1, "A", 35.85, 14.40), business(2, "B", 35.95, 14.60)];
        show_businesses(&provider, &mut scene, &results);

        assert_eq!(scene.len(), 2);
        assert!(scene.marker(99).is_none());
        assert!((scene.viewport.center.lat - 35.90).abs() < 1e-9);
        assert!((scene.viewport.center.lng - 14.50).abs() < 1e-9);
    }

    #[test]
    fn test_provider_from_config() {
        let config = ClientConfig::default();
        assert_eq!(provider_from_config(&config).unwrap().name(), "osm");

        let mapbox = ClientConfig {
            map_provider: MapProviderKind::Mapbox,
            mapbox_token: Some("pk.test".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(provider_from_config(&mapbox).unwrap().name(), "mapbox");

        let missing = ClientConfig {
            map_provider: MapProviderKind::Mapbox,
            ..ClientConfig::default()
        };
        assert!(provider_from_config(&missing).is_err());
    }
}
