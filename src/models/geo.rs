use crate::constants::*;
use crate::models::Coordinates;
use geo::BoundingRect;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Result<Self, String> {
        Coordinates::new(min_lat, min_lng)?;
        Coordinates::new(max_lat, max_lng)?;
        if min_lat > max_lat || min_lng > max_lng {
            return Err(format!(
                "Invalid bounding box: ({}, {}) must be south-west of ({}, {})",
                min_lat, min_lng, max_lat, max_lng
            ));
        }
        Ok(BoundingBox {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// The region ingestion covers when `REGION_BOUNDS` is not set.
    pub fn default_region() -> Self {
        BoundingBox {
            min_lat: DEFAULT_REGION_SOUTH,
            max_lat: DEFAULT_REGION_NORTH,
            min_lng: DEFAULT_REGION_WEST,
            max_lng: DEFAULT_REGION_EAST,
        }
    }

    /// Box enclosing every point within `radius_m` of `center`, with some
    /// slack. Used as a prefilter before exact Haversine checks. Spans all
    /// longitudes when the circle reaches a pole or crosses ±180°.
    pub fn from_center_radius(center: &Coordinates, radius_m: f64) -> Self {
        let lat_delta = radius_m / METERS_PER_DEGREE * (1.0 + PREFILTER_MARGIN);
        let min_lat = (center.lat - lat_delta).max(-90.0);
        let max_lat = (center.lat + lat_delta).min(90.0);

        // Meridians are closest together at the box edge farthest from the equator
        let widest_lat = min_lat.abs().max(max_lat.abs());
        let cos = widest_lat.to_radians().cos();
        let lng_delta = if cos > f64::EPSILON {
            lat_delta / cos
        } else {
            f64::INFINITY
        };

        let (min_lng, max_lng) = if lng_delta >= 180.0
            || center.lng - lng_delta < -180.0
            || center.lng + lng_delta > 180.0
        {
            (-180.0, 180.0)
        } else {
            (center.lng - lng_delta, center.lng + lng_delta)
        };

        BoundingBox {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Smallest box enclosing all points, or `None` for an empty slice.
    pub fn from_points(points: &[Coordinates]) -> Option<Self> {
        let multi_point: geo::MultiPoint<f64> = points
            .iter()
            .map(|c| geo::Point::new(c.lng, c.lat))
            .collect();

        multi_point.bounding_rect().map(|rect| BoundingBox {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }

    pub fn center(&self) -> Coordinates {
        Coordinates {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lng: (self.min_lng + self.max_lng) / 2.0,
        }
    }

    /// Overpass QL bbox filter: `(south,west,north,east)`
    pub fn to_overpass(&self) -> String {
        format!(
            "({},{},{},{})",
            self.min_lat, self.min_lng, self.max_lat, self.max_lng
        )
    }
}
