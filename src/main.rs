use axum::http::HeaderValue;
use bizmap::config::Config;
use bizmap::db::SqliteBusinessRepository;
use bizmap::services::DirectoryService;
use bizmap::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizmap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;

    tracing::info!("Starting bizmap API server");
    tracing::info!(
        "Ingestion region: {} (cache TTL {}s, limit {})",
        config.region.to_overpass(),
        config.ingest_cache_ttl,
        config.ingest_limit
    );

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = bizmap::db::create_pool(&config.database_url).await?;
    SqliteBusinessRepository::create_schema(&db_pool).await?;
    tracing::info!("Database ready");

    let directory = DirectoryService::from_config(&config, db_pool);
    let state = Arc::new(AppState { directory });

    // Build router with CORS and tracing
    let app = bizmap::routes::create_router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.server_address();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
