use crate::constants::EARTH_RADIUS_M;
use serde::{Deserialize, Serialize};

/// Great-circle distance in meters between two points given in degrees
/// (Haversine formula).
///
/// Pure arithmetic: never fails and performs no range checks. Passing an
/// out-of-range latitude or longitude yields a well-defined but meaningless
/// number; validating input is the caller's job (see [`Coordinates::new`]).
pub fn haversine_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!(
                "Invalid latitude: {} (must be between -90 and 90)",
                lat
            ));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(format!(
                "Invalid longitude: {} (must be between -180 and 180)",
                lng
            ));
        }
        Ok(Coordinates { lat, lng })
    }

    /// Distance to another point in meters
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        haversine_distance_m(self.lat, self.lng, other.lat, other.lng)
    }

    /// Distance to another point in kilometers
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        self.distance_m(other) / 1000.0
    }

    /// Round coordinates to specified decimal places
    pub fn round(&self, decimal_places: u32) -> Self {
        let multiplier = 10_f64.powi(decimal_places as i32);
        Coordinates {
            lat: (self.lat * multiplier).round() / multiplier,
            lng: (self.lng * multiplier).round() / multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUARTER_CIRCUMFERENCE_M: f64 = 10_007_543.0;

    #[test]
    fn test_coordinates_validation() {
        assert!(Coordinates::new(35.8989, 14.5146).is_ok());
        assert!(Coordinates::new(91.0, 0.0).is_err()); // Invalid lat
        assert!(Coordinates::new(0.0, 181.0).is_err()); // Invalid lng
    }

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(haversine_distance_m(35.8989, 14.5146, 35.8989, 14.5146), 0.0);
        assert_eq!(haversine_distance_m(-45.0, 170.0, -45.0, 170.0), 0.0);
    }

    #[test]
    fn test_quarter_circumference() {
        let d = haversine_distance_m(0.0, 0.0, 0.0, 90.0);
        assert!(
            (d - QUARTER_CIRCUMFERENCE_M).abs() < 1000.0,
            "expected ~{} m, got {}",
            QUARTER_CIRCUMFERENCE_M,
            d
        );
    }

    #[test]
    fn test_antipodal_points() {
        let d = haversine_distance_m(0.0, 0.0, 0.0, 180.0);
        assert!((d / 1000.0 - 20_015.0).abs() < 5.0, "got {} km", d / 1000.0);

        let poles = haversine_distance_m(90.0, 0.0, -90.0, 0.0);
        assert!((poles / 1000.0 - 20_015.0).abs() < 5.0);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ((35.8989, 14.5146), (35.9375, 14.3754)),
            ((48.8566, 2.3522), (51.5074, -0.1278)),
            ((-33.8688, 151.2093), (40.7128, -74.0060)),
        ];
        for ((lat1, lng1), (lat2, lng2)) in pairs {
            let ab = haversine_distance_m(lat1, lng1, lat2, lng2);
            let ba = haversine_distance_m(lat2, lng2, lat1, lng1);
            assert!((ab - ba).abs() < 1e-6, "{} != {}", ab, ba);
        }
    }

    #[test]
    fn test_points_on_equator_are_additive() {
        // B lies between A and C on the same great circle
        let ab = haversine_distance_m(0.0, 10.0, 0.0, 25.0);
        let bc = haversine_distance_m(0.0, 25.0, 0.0, 40.0);
        let ac = haversine_distance_m(0.0, 10.0, 0.0, 40.0);
        assert!((ab + bc - ac).abs() < 1e-3);

        // Same along a meridian
        let ab = haversine_distance_m(10.0, 14.5, 30.0, 14.5);
        let bc = haversine_distance_m(30.0, 14.5, 50.0, 14.5);
        let ac = haversine_distance_m(10.0, 14.5, 50.0, 14.5);
        assert!((ab + bc - ac).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_input_does_not_panic() {
        let d = haversine_distance_m(200.0, -500.0, 95.0, 720.0);
        assert!(d.is_finite());
    }

    #[test]
    fn test_distance_calculation() {
        let valletta = Coordinates::new(35.8989, 14.5146).unwrap();
        let mdina = Coordinates::new(35.8860, 14.4030).unwrap();

        // Valletta to Mdina is roughly 10 km as the crow flies
        let distance = valletta.distance_to(&mdina);
        assert!((distance - 10.1).abs() < 0.5, "got {} km", distance);
        assert!((valletta.distance_m(&mdina) - distance * 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_rounding() {
        let coords = Coordinates::new(35.898912, 14.514634).unwrap();
        let rounded = coords.round(3);
        assert_eq!(rounded.lat, 35.899);
        assert_eq!(rounded.lng, 14.515);
    }
}
