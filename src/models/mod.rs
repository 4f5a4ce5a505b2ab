pub mod business;
pub mod coordinates;
pub mod distance;
pub mod filters;
pub mod geo;
pub mod page;
pub mod stats;

pub use business::{Business, BusinessCategory, BusinessUpdate, NewBusiness};
pub use coordinates::{haversine_distance_m, Coordinates};
pub use distance::DistanceKm;
pub use filters::{ListParams, NearbyParams, SearchFilters};
pub use geo::BoundingBox;
pub use page::{BusinessList, Identified, Page, StoreList};
pub use stats::{
    BusinessStats, CategoryList, CategorySummary, RefreshAck, RefreshRequest, StoreStats,
    UpsertSummary,
};
