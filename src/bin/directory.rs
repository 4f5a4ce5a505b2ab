//! Terminal front end for the business directory.
//!
//! ```text
//! cargo run --bin directory -- --category=pharmacy --near="Sliema" --radius=2000
//! cargo run --bin directory -- --stores --query=lidl --pages=2
//! cargo run --bin directory -- --interactive
//! ```
//!
//! Talks to the API at `API_BASE_URL` and builds directions links with the
//! provider selected by `MAP_PROVIDER`.

use bizmap::client::view::{directions_link, summary_line, EMPTY_MESSAGE};
use bizmap::client::{
    ApiClient, BusinessesHook, Debouncer, FixedLocationProvider, GeocodedLocationProvider,
    GeolocationHook, ListState, LocationProvider, StoresHook, ViewState,
};
use bizmap::config::ClientConfig;
use bizmap::constants::DEFAULT_NEARBY_LIMIT;
use bizmap::map::{provider_from_config, show_businesses, MapProvider, MapScene};
use bizmap::models::{Business, BusinessCategory, Coordinates, SearchFilters};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        "\
Usage: directory [OPTIONS]

Browse the business directory from the terminal.

Options:
  --category=NAME  Only show one category (grocery, pharmacy, ...)
  --query=TEXT     Free-text search on name and address
  --near=PLACE     Search around a place name, or 'here' for the default center
  --radius=METERS  Search radius around --near (default from config)
  --pages=N        Load N further pages after the first
  --stores         Use the grocery store endpoints
  --map            Print the rendered map view as JSON
  --interactive    Read searches from stdin (see :help)
  --help           Show this help message"
    );
}

fn print_interactive_help() {
    println!(
        "\
Type to search. Commands:
  :cat NAME   filter by category (':cat' alone clears it)
  :near PLACE search around a place ('here' for the default center)
  :clear      drop the location constraint
  :more       load the next page
  :cats       list categories with counts
  :quit       exit"
    );
}

fn arg<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("--{}=", name);
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn flag(args: &[String], name: &str) -> bool {
    let expected = format!("--{}", name);
    args.iter().any(|a| *a == expected)
}

async fn locate<P: LocationProvider>(provider: P, config: &ClientConfig) -> Option<Coordinates> {
    let hook = GeolocationHook::new(provider, config.geolocation_timeout());
    match hook.locate().await {
        Ok(position) => Some(position),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    }
}

/// `here` is the configured default center, anything else is geocoded.
async fn resolve_place(
    place: &str,
    map: &Arc<dyn MapProvider>,
    config: &ClientConfig,
) -> Option<Coordinates> {
    if place.trim().eq_ignore_ascii_case("here") {
        locate(FixedLocationProvider::new(config.default_center), config).await
    } else {
        locate(GeocodedLocationProvider::new(map.clone(), place.trim()), config).await
    }
}

fn print_results(state: &ListState<Business>, map: &dyn MapProvider, origin: Option<Coordinates>) {
    match ViewState::of(state) {
        ViewState::Loading => println!("Loading..."),
        ViewState::Error(message) => println!("Error: {}", message),
        ViewState::Empty => println!("{}", EMPTY_MESSAGE),
        ViewState::Results(items) => {
            println!("Showing {} of {}", items.len(), state.total);
            for business in items {
                println!("  {}", summary_line(business));
                println!("      {}", directions_link(map, origin, business));
            }
            if state.has_more {
                println!("  ... more results available");
            }
        }
    }
}

fn print_map(map: &dyn MapProvider, config: &ClientConfig, businesses: &[Business]) {
    let mut scene = MapScene::from_config(config);
    show_businesses(map, &mut scene, businesses);
    match serde_json::to_string_pretty(&map.render(&scene)) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Could not render map: {}", e),
    }
}

async fn run_stores(
    api: ApiClient,
    config: &ClientConfig,
    filters: SearchFilters,
    pages: u32,
) -> ListState<Business> {
    let hook = StoresHook::new(api, config);

    match filters.center() {
        Some(center) if filters.text().is_none() => {
            hook.nearby(center, filters.radius_or_default(), DEFAULT_NEARBY_LIMIT)
                .await;
        }
        _ if filters.text().is_some() || filters.center().is_some() => {
            hook.search(filters).await;
        }
        _ => {
            hook.list(0, filters.limit).await;
        }
    }
    for _ in 0..pages {
        if !hook.load_more().await {
            break;
        }
    }

    match hook.stats().await {
        Ok(stats) => println!(
            "{} stores, {} rated{}",
            stats.total_stores,
            stats.stores_with_ratings,
            stats
                .average_rating
                .map(|r| format!(", average ★ {:.1}", r))
                .unwrap_or_default()
        ),
        Err(e) => eprintln!("Stats unavailable: {}", e),
    }
    hook.snapshot()
}

async fn run_businesses(
    api: ApiClient,
    config: &ClientConfig,
    filters: SearchFilters,
    pages: u32,
) -> ListState<Business> {
    let hook = BusinessesHook::new(api, config);
    if hook.load_categories().await.is_ok() {
        let summary: Vec<String> = hook
            .categories()
            .iter()
            .map(|c| format!("{} {} ({})", c.icon, c.name, c.count))
            .collect();
        println!("{}", summary.join("  "));
    }

    hook.fetch(filters).await;
    for _ in 0..pages {
        if !hook.load_more().await {
            break;
        }
    }
    hook.snapshot()
}

async fn interactive(
    api: ApiClient,
    config: ClientConfig,
    map: Arc<dyn MapProvider>,
) -> Result<(), Box<dyn std::error::Error>> {
    let hook = Arc::new(BusinessesHook::new(api, &config));
    let debouncer = Debouncer::new(config.debounce_delay());
    let (origin_tx, origin_rx) = watch::channel::<Option<Coordinates>>(None);

    // Re-render on every settled state change
    let mut results = hook.subscribe();
    let render_map = map.clone();
    let renderer = tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let state = results.borrow_and_update().clone();
            if !state.loading {
                print_results(&state, render_map.as_ref(), *origin_rx.borrow());
            }
        }
    });

    print_interactive_help();
    hook.fetch(SearchFilters::default()).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            ":quit" | ":q" => break,
            ":help" => print_interactive_help(),
            ":more" => {
                hook.load_more().await;
            }
            ":clear" => {
                origin_tx.send_replace(None);
                hook.clear_location().await;
            }
            ":cats" => {
                if hook.load_categories().await.is_ok() {
                    for c in hook.categories() {
                        println!("  {} {:<24} {}", c.icon, c.name, c.count);
                    }
                }
            }
            ":cat" => {
                let category = if rest.trim().is_empty() {
                    None
                } else {
                    match rest.parse::<BusinessCategory>() {
                        Ok(category) => Some(category),
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    }
                };
                hook.select_category(category).await;
            }
            ":near" => {
                if let Some(center) = resolve_place(rest, &map, &config).await {
                    origin_tx.send_replace(Some(center));
                    hook.search_near(center, config.default_radius_m).await;
                }
            }
            _ => {
                let hook = hook.clone();
                let text = line.to_string();
                debouncer.call(async move {
                    hook.search_text(&text).await;
                });
            }
        }
    }

    debouncer.cancel();
    renderer.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if flag(&args, "help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizmap=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;
    let api = ApiClient::new(&config)?;
    let map = provider_from_config(&config)?;

    match api.health().await {
        Ok(health) if health.status == "healthy" => {}
        Ok(health) => eprintln!("Warning: {} reports status '{}'", health.service, health.status),
        Err(e) => eprintln!("Warning: {}", e),
    }

    if flag(&args, "interactive") {
        return interactive(api, config, map).await;
    }

    let mut filters = SearchFilters::default();
    if let Some(query) = arg(&args, "query") {
        filters = filters.with_query(query);
    }
    if let Some(category) = arg(&args, "category") {
        filters = filters.with_category(category.parse()?);
    }

    let origin = match arg(&args, "near") {
        Some(place) => resolve_place(place, &map, &config).await,
        None => None,
    };
    if let Some(center) = origin {
        let radius = match arg(&args, "radius") {
            Some(raw) => raw.parse::<f64>().map_err(|_| "Invalid --radius")?,
            None => config.default_radius_m,
        };
        filters = filters.near(center, config.clamp_radius(radius));
    }

    let pages = match arg(&args, "pages") {
        Some(raw) => raw.parse::<u32>().map_err(|_| "Invalid --pages")?,
        None => 0,
    };

    let state = if flag(&args, "stores") {
        run_stores(api, &config, filters, pages).await
    } else {
        run_businesses(api, &config, filters, pages).await
    };

    print_results(&state, map.as_ref(), origin);
    if flag(&args, "map") {
        print_map(map.as_ref(), &config, &state.items);
    }
    Ok(())
}
