use crate::models::BusinessCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_stores: u64,
    pub stores_with_ratings: u64,
    pub average_rating: Option<f64>,
    pub coverage_percentage: f64,
}

impl StoreStats {
    pub fn new(total_stores: u64, stores_with_ratings: u64, average_rating: Option<f64>) -> Self {
        StoreStats {
            total_stores,
            stores_with_ratings,
            average_rating: average_rating.map(|r| round_to(r, 2)),
            coverage_percentage: round_to(percentage(stores_with_ratings, total_stores), 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessStats {
    pub total_businesses: u64,
    pub businesses_with_phone: u64,
    pub businesses_with_website: u64,
    pub businesses_with_email: u64,
    /// Share of records with a phone number or a website
    pub contact_coverage_percentage: f64,
    pub categories: BTreeMap<BusinessCategory, u64>,
}

impl BusinessStats {
    pub fn new(
        total_businesses: u64,
        with_phone: u64,
        with_website: u64,
        with_email: u64,
        with_any_contact: u64,
        categories: BTreeMap<BusinessCategory, u64>,
    ) -> Self {
        BusinessStats {
            total_businesses,
            businesses_with_phone: with_phone,
            businesses_with_website: with_website,
            businesses_with_email: with_email,
            contact_coverage_percentage: round_to(
                percentage(with_any_contact, total_businesses),
                1,
            ),
            categories,
        }
    }
}

/// Category entry of `GET /api/businesses/categories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub key: BusinessCategory,
    pub name: String,
    pub icon: String,
    pub count: u64,
}

impl CategorySummary {
    pub fn new(category: BusinessCategory, count: u64) -> Self {
        CategorySummary {
            key: category,
            name: category.display_name().to_string(),
            icon: category.icon().to_string(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryList {
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub force_refresh: bool,
}

/// Answer to a refresh trigger; the ingestion itself runs in the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshAck {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<BusinessCategory>,
}

impl RefreshAck {
    pub fn started(job_id: Uuid, category: BusinessCategory, force_refresh: bool) -> Self {
        let message = if force_refresh {
            format!("Forced refresh of {} data started in background", category)
        } else {
            format!("Refresh of {} data started in background", category)
        };
        RefreshAck {
            status: "started".to_string(),
            message,
            job_id: Some(job_id),
            category: Some(category),
        }
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub added: u64,
    pub updated: u64,
}

impl UpsertSummary {
    pub fn total(&self) -> u64 {
        self.added + self.updated
    }
}

impl std::ops::AddAssign for UpsertSummary {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.updated += other.updated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_stats_rounding() {
        let stats = StoreStats::new(3, 2, Some(4.23456));
        assert_eq!(stats.average_rating, Some(4.23));
        assert_eq!(stats.coverage_percentage, 66.67);
    }

    #[test]
    fn test_empty_stats_have_zero_coverage() {
        let stats = StoreStats::new(0, 0, None);
        assert_eq!(stats.coverage_percentage, 0.0);
        assert_eq!(stats.average_rating, None);

        let stats = BusinessStats::new(0, 0, 0, 0, 0, BTreeMap::new());
        assert_eq!(stats.contact_coverage_percentage, 0.0);
    }

    #[test]
    fn test_business_stats_serialize_category_keys() {
        let mut categories = BTreeMap::new();
        categories.insert(BusinessCategory::Pharmacy, 4);
        categories.insert(BusinessCategory::Grocery, 2);
        let stats = BusinessStats::new(6, 3, 2, 1, 4, categories);
        assert_eq!(stats.contact_coverage_percentage, 66.7);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["categories"]["pharmacy"], 4);
        assert_eq!(json["categories"]["grocery"], 2);
    }

    #[test]
    fn test_category_summary_labels() {
        let summary = CategorySummary::new(BusinessCategory::Religion, 12);
        assert_eq!(summary.name, "Churches & Religious Sites");
        assert_eq!(summary.icon, "⛪");
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["key"], "religion");
    }

    #[test]
    fn test_upsert_summary_accumulates() {
        let mut total = UpsertSummary::default();
        total += UpsertSummary { added: 3, updated: 1 };
        total += UpsertSummary { added: 0, updated: 2 };
        assert_eq!(total, UpsertSummary { added: 3, updated: 3 });
        assert_eq!(total.total(), 6);
    }
}
