use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;

pub mod business_repository;
pub mod sqlite_repo;

pub use business_repository::{BusinessFilter, BusinessRepository};
pub use sqlite_repo::SqliteBusinessRepository;

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}
