use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::QueryBuilder;
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::constants::DUPLICATE_LOCATION_EPSILON_DEG;
use crate::error::{AppError, Result};
use crate::models::business::search_key;
use crate::models::{
    BoundingBox, Business, BusinessCategory, BusinessStats, BusinessUpdate, Coordinates,
    NewBusiness, Page, StoreStats, UpsertSummary,
};

use super::business_repository::{
    format_timestamp, BusinessFilter, BusinessRepository, RawBusinessRow,
};

const SELECT_COLUMNS: &str = "SELECT id, place_id, name, latitude, longitude, category,
        formatted_address, phone_number, website, email, rating, user_ratings_total,
        price_level, business_status, permanently_closed, opening_hours, business_types,
        brand, operator, osm_type, created_at, updated_at, last_verified
     FROM businesses";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Escape LIKE wildcards so user input matches literally. Lowercased the
/// same way as the stored `search_text`.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Append `WHERE ...` for `filter`. Always emits a WHERE so callers can
/// keep chaining `AND` clauses.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &BusinessFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(ref text) = filter.text {
        qb.push(" AND search_text LIKE ")
            .push_bind(like_pattern(text))
            .push(" ESCAPE '\\'");
    }
    if let Some(category) = filter.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(min_rating) = filter.min_rating {
        qb.push(" AND rating >= ").push_bind(min_rating);
    }
    if let Some(max_price) = filter.max_price_level {
        qb.push(" AND price_level <= ").push_bind(max_price as i64);
    }
    if filter.exclude_closed {
        qb.push(" AND permanently_closed = 0");
    }
}

fn encode_types(types: &[String]) -> Option<String> {
    if types.is_empty() {
        None
    } else {
        serde_json::to_string(types).ok()
    }
}

fn now() -> String {
    format_timestamp(OffsetDateTime::now_utc())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

pub struct SqliteBusinessRepository {
    pool: SqlitePool,
}

impl SqliteBusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the SQLite schema (table + indexes). Idempotent.
    pub async fn create_schema(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS businesses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                place_id TEXT UNIQUE,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                category TEXT NOT NULL DEFAULT 'grocery',
                formatted_address TEXT,
                phone_number TEXT,
                website TEXT,
                email TEXT,
                rating REAL,
                user_ratings_total INTEGER,
                price_level INTEGER,
                business_status TEXT,
                permanently_closed INTEGER NOT NULL DEFAULT 0,
                opening_hours TEXT,
                business_types TEXT,
                brand TEXT,
                operator TEXT,
                osm_type TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                last_verified TEXT,
                search_text TEXT NOT NULL DEFAULT ''
            )",
        )
        .execute(pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_businesses_category ON businesses(category)",
            "CREATE INDEX IF NOT EXISTS idx_businesses_name ON businesses(name)",
            "CREATE INDEX IF NOT EXISTS idx_businesses_location ON businesses(latitude, longitude)",
        ] {
            sqlx::query(statement).execute(pool).await?;
        }

        Self::backfill_search_text(pool).await
    }

    /// Databases created before free-text search was keyed in Rust lack
    /// the column; add it and fill rows that have no key yet.
    async fn backfill_search_text(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
        let has_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('businesses') WHERE name = 'search_text'",
        )
        .fetch_one(pool)
        .await?;
        if has_column == 0 {
            sqlx::query("ALTER TABLE businesses ADD COLUMN search_text TEXT NOT NULL DEFAULT ''")
                .execute(pool)
                .await?;
        }

        let rows: Vec<(i64, String, Option<String>)> = sqlx::query_as(
            "SELECT id, name, formatted_address FROM businesses WHERE search_text = ''",
        )
        .fetch_all(pool)
        .await?;
        if rows.is_empty() {
            return Ok(());
        }

        tracing::info!("Building search keys for {} businesses", rows.len());
        let mut tx = pool.begin().await?;
        for (id, name, address) in rows {
            sqlx::query("UPDATE businesses SET search_text = ?1 WHERE id = ?2")
                .bind(search_key(&name, address.as_deref()))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    async fn find_duplicate(
        conn: &mut sqlx::SqliteConnection,
        business: &NewBusiness,
    ) -> std::result::Result<Option<i64>, sqlx::Error> {
        let by_place_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM businesses WHERE place_id = ?1")
                .bind(&business.place_id)
                .fetch_optional(&mut *conn)
                .await?;
        if by_place_id.is_some() {
            return Ok(by_place_id);
        }

        sqlx::query_scalar(
            "SELECT id FROM businesses
             WHERE name = ?1 AND category = ?2
               AND ABS(latitude - ?3) < ?5 AND ABS(longitude - ?4) < ?5
             LIMIT 1",
        )
        .bind(business.name.trim())
        .bind(business.category.as_str())
        .bind(business.latitude)
        .bind(business.longitude)
        .bind(DUPLICATE_LOCATION_EPSILON_DEG)
        .fetch_optional(&mut *conn)
        .await
    }

    async fn insert_row(
        conn: &mut sqlx::SqliteConnection,
        business: &NewBusiness,
        verified: bool,
    ) -> std::result::Result<i64, sqlx::Error> {
        let created_at = now();
        let last_verified = verified.then(|| created_at.clone());

        let result = sqlx::query(
            "INSERT INTO businesses (place_id, name, latitude, longitude, category,
                                     formatted_address, phone_number, website, email,
                                     rating, user_ratings_total, price_level, business_status,
                                     permanently_closed, opening_hours, business_types,
                                     brand, operator, osm_type, created_at, last_verified,
                                     search_text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22)",
        )
        .bind(&business.place_id)
        .bind(business.name.trim())
        .bind(business.latitude)
        .bind(business.longitude)
        .bind(business.category.as_str())
        .bind(&business.formatted_address)
        .bind(&business.phone_number)
        .bind(&business.website)
        .bind(&business.email)
        .bind(business.rating)
        .bind(business.user_ratings_total.map(i64::from))
        .bind(business.price_level.map(i64::from))
        .bind(&business.business_status)
        .bind(business.permanently_closed)
        .bind(&business.opening_hours)
        .bind(encode_types(&business.business_types))
        .bind(&business.brand)
        .bind(&business.operator)
        .bind(&business.osm_type)
        .bind(&created_at)
        .bind(last_verified)
        .bind(search_key(&business.name, business.formatted_address.as_deref()))
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Refresh an existing row with freshly ingested data. Ratings and
    /// closure flags are left alone since the source does not carry them.
    async fn refresh_row(
        conn: &mut sqlx::SqliteConnection,
        id: i64,
        business: &NewBusiness,
    ) -> std::result::Result<(), sqlx::Error> {
        let ts = now();
        sqlx::query(
            "UPDATE businesses SET
                place_id = COALESCE(place_id, ?1),
                name = ?2,
                latitude = ?3,
                longitude = ?4,
                formatted_address = ?5,
                phone_number = COALESCE(?6, phone_number),
                website = COALESCE(?7, website),
                email = COALESCE(?8, email),
                opening_hours = COALESCE(?9, opening_hours),
                business_types = COALESCE(?10, business_types),
                brand = COALESCE(?11, brand),
                operator = COALESCE(?12, operator),
                osm_type = COALESCE(?13, osm_type),
                updated_at = ?14,
                last_verified = ?14,
                search_text = ?16
             WHERE id = ?15",
        )
        .bind(&business.place_id)
        .bind(business.name.trim())
        .bind(business.latitude)
        .bind(business.longitude)
        .bind(&business.formatted_address)
        .bind(&business.phone_number)
        .bind(&business.website)
        .bind(&business.email)
        .bind(&business.opening_hours)
        .bind(encode_types(&business.business_types))
        .bind(&business.brand)
        .bind(&business.operator)
        .bind(&business.osm_type)
        .bind(&ts)
        .bind(id)
        .bind(search_key(&business.name, business.formatted_address.as_deref()))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BusinessRepository for SqliteBusinessRepository {
    async fn search(
        &self,
        filter: &BusinessFilter,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Business>> {
        let total = self.count(filter).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY name COLLATE NOCASE, id LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows: Vec<RawBusinessRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        tracing::debug!(
            "Business search matched {} rows (offset {}, limit {}, total {})",
            rows.len(),
            offset,
            limit,
            total
        );

        let items = rows.into_iter().map(RawBusinessRow::into_business).collect();
        Ok(Page::new(items, total, offset, limit))
    }

    async fn find_nearby(
        &self,
        center: &Coordinates,
        radius_m: f64,
        filter: &BusinessFilter,
        limit: u32,
    ) -> Result<Vec<Business>> {
        let bbox = BoundingBox::from_center_radius(center, radius_m);

        // Bounding-box pre-filter
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filter(&mut qb, filter);
        qb.push(" AND latitude BETWEEN ")
            .push_bind(bbox.min_lat)
            .push(" AND ")
            .push_bind(bbox.max_lat)
            .push(" AND longitude BETWEEN ")
            .push_bind(bbox.min_lng)
            .push(" AND ")
            .push_bind(bbox.max_lng);

        let rows: Vec<RawBusinessRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        // Haversine post-filter + sort by distance + limit
        let mut results: Vec<(f64, Business)> = rows
            .into_iter()
            .map(RawBusinessRow::into_business)
            .filter_map(|business| {
                let dist_m = center.distance_m(&business.coordinates());
                if dist_m <= radius_m {
                    Some((dist_m, business))
                } else {
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(results
            .into_iter()
            .take(limit as usize)
            .map(|(_, business)| business.with_distance_from(center))
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Business>> {
        let row: Option<RawBusinessRow> =
            sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(RawBusinessRow::into_business))
    }

    async fn insert(&self, business: &NewBusiness) -> Result<Business> {
        let mut conn = self.pool.acquire().await?;
        let id = match Self::insert_row(&mut *conn, business, false).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Conflict(format!(
                    "Business with place_id '{}' already exists",
                    business.place_id
                )));
            }
            Err(e) => return Err(e.into()),
        };
        drop(conn);

        self.get(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Inserted business {} not found", id)))
    }

    async fn update(&self, id: i64, update: &BusinessUpdate) -> Result<Option<Business>> {
        let Some(mut business) = self.get(id).await? else {
            return Ok(None);
        };
        update.apply_to(&mut business);

        sqlx::query(
            "UPDATE businesses SET
                name = ?1, category = ?2, formatted_address = ?3, phone_number = ?4,
                website = ?5, email = ?6, rating = ?7, user_ratings_total = ?8,
                price_level = ?9, business_status = ?10, permanently_closed = ?11,
                opening_hours = ?12, business_types = ?13, updated_at = ?14, search_text = ?16
             WHERE id = ?15",
        )
        .bind(&business.name)
        .bind(business.category.as_str())
        .bind(&business.formatted_address)
        .bind(&business.phone_number)
        .bind(&business.website)
        .bind(&business.email)
        .bind(business.rating)
        .bind(business.user_ratings_total.map(i64::from))
        .bind(business.price_level.map(i64::from))
        .bind(&business.business_status)
        .bind(business.permanently_closed)
        .bind(&business.opening_hours)
        .bind(encode_types(&business.business_types))
        .bind(now())
        .bind(id)
        .bind(search_key(&business.name, business.formatted_address.as_deref()))
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM businesses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_batch(&self, businesses: &[NewBusiness]) -> Result<UpsertSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = UpsertSummary::default();

        for business in businesses {
            match Self::find_duplicate(&mut *tx, business).await? {
                Some(id) => {
                    Self::refresh_row(&mut *tx, id, business).await?;
                    summary.updated += 1;
                }
                None => {
                    Self::insert_row(&mut *tx, business, true).await?;
                    summary.added += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn count(&self, filter: &BusinessFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM businesses");
        push_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn store_stats(&self) -> Result<StoreStats> {
        let (total, rated, average): (i64, i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(rating), AVG(rating)
             FROM businesses
             WHERE category = ?1 AND permanently_closed = 0",
        )
        .bind(BusinessCategory::Grocery.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats::new(total as u64, rated as u64, average))
    }

    async fn business_stats(&self, category: Option<BusinessCategory>) -> Result<BusinessStats> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN COALESCE(phone_number, '') != '' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN COALESCE(website, '') != '' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN COALESCE(email, '') != '' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN COALESCE(phone_number, '') != ''
                                    OR COALESCE(website, '') != '' THEN 1 ELSE 0 END), 0)
             FROM businesses",
        );
        push_filter(
            &mut qb,
            &BusinessFilter {
                category,
                ..Default::default()
            },
        );

        let (total, phone, website, email, any_contact): (i64, i64, i64, i64, i64) =
            qb.build_query_as().fetch_one(&self.pool).await?;

        let categories = match category {
            Some(c) => BTreeMap::from([(c, total as u64)]),
            None => self.category_counts().await?,
        };

        Ok(BusinessStats::new(
            total as u64,
            phone as u64,
            website as u64,
            email as u64,
            any_contact as u64,
            categories,
        ))
    }

    async fn category_counts(&self) -> Result<BTreeMap<BusinessCategory, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT category, COUNT(*) FROM businesses GROUP BY category")
                .fetch_all(&self.pool)
                .await?;

        let mut counts: BTreeMap<BusinessCategory, u64> =
            BusinessCategory::ALL.into_iter().map(|c| (c, 0)).collect();
        for (raw, count) in rows {
            match raw.parse::<BusinessCategory>() {
                Ok(category) => *counts.entry(category).or_default() += count as u64,
                Err(_) => tracing::warn!("Ignoring {} rows with unknown category '{}'", count, raw),
            }
        }
        Ok(counts)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sqlite_repo_tests.rs"]
mod sqlite_repo_tests;
