use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance in kilometers, as reported next to nearby results
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct DistanceKm(pub f64);

impl DistanceKm {
    pub fn as_km(self) -> f64 {
        self.0
    }

    /// Round to two decimals, the precision distances are reported with
    pub fn rounded(self) -> Self {
        DistanceKm((self.0 * 100.0).round() / 100.0)
    }
}

/// Meters below one kilometer, kilometers with two decimals above
impl fmt::Display for DistanceKm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 1.0 {
            write!(f, "{:.0}m", self.0 * 1000.0)
        } else {
            write!(f, "{:.2}km", self.0)
        }
    }
}
