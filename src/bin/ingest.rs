//! CLI tool that pulls businesses from Overpass into the directory database.
//!
//! ```text
//! cargo run --bin ingest -- --category=all
//! cargo run --bin ingest -- --category=pharmacy --force
//! ```
//!
//! Reads the same environment as the server (`DATABASE_URL`,
//! `REGION_BOUNDS`, `OVERPASS_URL`, `INGEST_LIMIT`, ...).

use bizmap::config::Config;
use bizmap::db::SqliteBusinessRepository;
use bizmap::models::{BusinessCategory, UpsertSummary};
use bizmap::services::DirectoryService;
use std::env;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Thousands separators for report lines (1234 -> "1,234").
fn fmt_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn print_help() {
    let names: Vec<&str> = BusinessCategory::ALL.iter().map(|c| c.as_str()).collect();
    eprintln!(
        "\
Usage: ingest [OPTIONS]

Fetch businesses from OpenStreetMap (Overpass) and upsert them into the
directory database.

Options:
  --category=NAME  Category to ingest, or 'all' (default: grocery)
                   One of: {}
  --force          Bypass the ingest cache
  --database=URL   Override DATABASE_URL
  --help           Show this help message",
        names.join(", ")
    );
}

fn parse_categories(raw: &str) -> Result<Vec<BusinessCategory>, String> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(BusinessCategory::ALL.to_vec());
    }
    raw.split(',').map(str::parse).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizmap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let categories = parse_categories(
        args.iter()
            .find_map(|a| a.strip_prefix("--category="))
            .unwrap_or("grocery"),
    )?;
    let force = args.iter().any(|a| a == "--force");

    let mut config = Config::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;
    if let Some(url) = args.iter().find_map(|a| a.strip_prefix("--database=")) {
        config.database_url = url.to_string();
    }

    eprintln!("Database: {}", config.database_url);
    eprintln!("Region:   {}", config.region.to_overpass());
    eprintln!(
        "Ingesting {} categor{}{}",
        categories.len(),
        if categories.len() == 1 { "y" } else { "ies" },
        if force { " (cache bypassed)" } else { "" }
    );
    eprintln!();

    let pool = bizmap::db::create_pool(&config.database_url).await?;
    SqliteBusinessRepository::create_schema(&pool).await?;
    let directory = DirectoryService::from_config(&config, pool);

    let t_total = Instant::now();
    let results = directory.refresh_all(&categories, force).await;

    let mut totals = UpsertSummary::default();
    let mut failures = 0usize;
    for (category, result) in results {
        match result {
            Ok(report) => {
                eprintln!(
                    "  {:<12} {:>7} fetched{}  {:>7} added  {:>7} updated",
                    category.as_str(),
                    fmt_count(report.fetched as u64),
                    if report.from_cache { " (cached)" } else { "         " },
                    fmt_count(report.summary.added),
                    fmt_count(report.summary.updated)
                );
                totals += report.summary;
            }
            Err(e) => {
                failures += 1;
                eprintln!("  {:<12} FAILED: {}", category.as_str(), e);
            }
        }
    }

    eprintln!();
    eprintln!(
        "Done in {:.1}s: {} added, {} updated, {} failed",
        t_total.elapsed().as_secs_f64(),
        fmt_count(totals.added),
        fmt_count(totals.updated),
        failures
    );

    if failures > 0 {
        return Err(format!("{} categor{} failed", failures, if failures == 1 { "y" } else { "ies" }).into());
    }
    Ok(())
}
