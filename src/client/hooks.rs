//! Per-feature state containers over [`ApiClient`].
//!
//! Hooks publish their state through a `watch` channel; views subscribe and
//! re-render on change. Failures end up as display strings in the state,
//! never as panics.

use crate::client::api::{ApiClient, ClientError};
use crate::client::state::{FetchTicket, ListState};
use crate::config::ClientConfig;
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::models::{
    Business, BusinessCategory, CategorySummary, Coordinates, Page, RefreshAck, SearchFilters,
    StoreStats,
};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Issue a ticket, await `fetch`, and apply the outcome if the ticket is
/// still the latest. Returns whether the outcome was applied.
async fn run_fetch<F>(state: &watch::Sender<ListState<Business>>, offset: u32, fetch: F) -> bool
where
    F: Future<Output = Result<Page<Business>, ClientError>>,
{
    let mut ticket = FetchTicket {
        generation: 0,
        offset,
    };
    state.send_modify(|s| ticket = s.begin(offset));

    let outcome = fetch.await;
    if let Err(ref e) = outcome {
        tracing::warn!("Fetch failed: {}", e);
    }

    state.send_if_modified(|s| s.finish(ticket, outcome))
}

/// Run a refresh trigger under its own ticket. A failure is applied like a
/// failed fetch; success leaves the ticket open for the re-fetch that follows.
async fn run_trigger<F>(state: &watch::Sender<ListState<Business>>, call: F) -> Result<RefreshAck, ClientError>
where
    F: Future<Output = Result<RefreshAck, ClientError>>,
{
    let mut ticket = FetchTicket {
        generation: 0,
        offset: 0,
    };
    state.send_modify(|s| ticket = s.begin(0));

    let outcome = call.await;
    if let Err(ref e) = outcome {
        tracing::warn!("Refresh failed: {}", e);
        state.send_if_modified(|s| s.finish(ticket, Err::<Page<Business>, _>(e)));
    }
    outcome
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// The query a [`StoresHook`] last ran, replayed by `load_more` and `refresh`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoresQuery {
    All { limit: u32 },
    Search(SearchFilters),
    Nearby {
        center: Coordinates,
        radius_m: f64,
        limit: u32,
    },
}

pub struct StoresHook {
    api: ApiClient,
    state: watch::Sender<ListState<Business>>,
    query: Mutex<StoresQuery>,
    refresh_delay: Duration,
}

impl StoresHook {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(ListState::default());
        StoresHook {
            api,
            state,
            query: Mutex::new(StoresQuery::All {
                limit: DEFAULT_PAGE_SIZE,
            }),
            refresh_delay: config.refresh_refetch_delay(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<Business>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ListState<Business> {
        self.state.borrow().clone()
    }

    pub fn current_query(&self) -> StoresQuery {
        lock(&self.query).clone()
    }

    async fn execute(&self, query: StoresQuery, offset: u32) -> bool {
        *lock(&self.query) = query.clone();

        match query {
            StoresQuery::All { limit } => {
                run_fetch(&self.state, offset, self.api.list_stores(offset, limit)).await
            }
            StoresQuery::Search(filters) => {
                let limit = filters.limit;
                let filters = filters.page(offset, limit);
                run_fetch(&self.state, offset, self.api.search_stores(&filters)).await
            }
            StoresQuery::Nearby {
                center,
                radius_m,
                limit,
            } => {
                let fetch = async {
                    self.api
                        .nearby_stores(center, radius_m, limit)
                        .await
                        .map(Page::complete)
                };
                run_fetch(&self.state, 0, fetch).await
            }
        }
    }

    pub async fn list(&self, skip: u32, limit: u32) -> bool {
        self.execute(StoresQuery::All { limit }, skip).await
    }

    pub async fn search(&self, filters: SearchFilters) -> bool {
        let offset = filters.offset;
        self.execute(StoresQuery::Search(filters), offset).await
    }

    pub async fn nearby(&self, center: Coordinates, radius_m: f64, limit: u32) -> bool {
        self.execute(
            StoresQuery::Nearby {
                center,
                radius_m,
                limit,
            },
            0,
        )
        .await
    }

    /// Fetch the next page of the current query. Does nothing when there is
    /// no further page or a fetch is already running.
    pub async fn load_more(&self) -> bool {
        let (can_load, offset) = {
            let state = self.state.borrow();
            (state.can_load_more(), state.next_offset())
        };
        if !can_load {
            return false;
        }
        self.execute(self.current_query(), offset).await
    }

    /// Trigger backend re-ingestion, wait for it to make progress, then
    /// re-fetch the first page of the current query.
    pub async fn refresh(&self, force_refresh: bool) -> Result<RefreshAck, ClientError> {
        let ack = run_trigger(&self.state, self.api.refresh_stores(force_refresh)).await?;
        tracing::info!("Refresh triggered: {}", ack.message);

        tokio::time::sleep(self.refresh_delay).await;
        self.execute(self.current_query(), 0).await;
        Ok(ack)
    }

    pub async fn stats(&self) -> Result<StoreStats, ClientError> {
        self.api.store_stats().await
    }
}

// ---------------------------------------------------------------------------
// Businesses
// ---------------------------------------------------------------------------

pub struct BusinessesHook {
    api: ApiClient,
    state: watch::Sender<ListState<Business>>,
    categories: watch::Sender<Vec<CategorySummary>>,
    filters: Mutex<SearchFilters>,
    config: ClientConfig,
}

impl BusinessesHook {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(ListState::default());
        let (categories, _) = watch::channel(Vec::new());
        BusinessesHook {
            api,
            state,
            categories,
            filters: Mutex::new(SearchFilters::default()),
            config: config.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<Business>> {
        self.state.subscribe()
    }

    pub fn subscribe_categories(&self) -> watch::Receiver<Vec<CategorySummary>> {
        self.categories.subscribe()
    }

    pub fn snapshot(&self) -> ListState<Business> {
        self.state.borrow().clone()
    }

    pub fn categories(&self) -> Vec<CategorySummary> {
        self.categories.borrow().clone()
    }

    /// Filters of the current query
    pub fn filters(&self) -> SearchFilters {
        lock(&self.filters).clone()
    }

    pub async fn load_categories(&self) -> Result<(), ClientError> {
        match self.api.categories().await {
            Ok(categories) => {
                self.categories.send_replace(categories);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Loading categories failed: {}", e);
                // Issued and failed in one step so no older fetch can clear it
                self.state.send_modify(|s| {
                    let ticket = s.begin(0);
                    s.finish(ticket, Err::<Page<Business>, _>(&e));
                });
                Err(e)
            }
        }
    }

    async fn run(&self, filters: SearchFilters) -> bool {
        let offset = filters.offset;
        run_fetch(&self.state, offset, self.api.list_businesses(&filters)).await
    }

    /// Replace the current query with `filters` and fetch.
    pub async fn fetch(&self, filters: SearchFilters) -> bool {
        *lock(&self.filters) = filters.clone();
        self.run(filters).await
    }

    /// Change one aspect of the current query and fetch it from the start.
    async fn refine(&self, change: impl FnOnce(&mut SearchFilters)) -> bool {
        let filters = {
            let mut current = lock(&self.filters);
            change(&mut current);
            current.offset = 0;
            current.clone()
        };
        self.run(filters).await
    }

    pub async fn select_category(&self, category: Option<BusinessCategory>) -> bool {
        self.refine(|f| f.category = category).await
    }

    /// Blank text clears the text constraint.
    pub async fn search_text(&self, query: &str) -> bool {
        let query = query.trim().to_string();
        self.refine(|f| f.query = (!query.is_empty()).then_some(query))
            .await
    }

    /// Radius is clamped to the configured search range.
    pub async fn search_near(&self, center: Coordinates, radius_m: f64) -> bool {
        let radius_m = self.config.clamp_radius(radius_m);
        self.refine(|f| {
            f.latitude = Some(center.lat);
            f.longitude = Some(center.lng);
            f.radius = Some(radius_m);
        })
        .await
    }

    pub async fn clear_location(&self) -> bool {
        self.refine(|f| {
            f.latitude = None;
            f.longitude = None;
            f.radius = None;
        })
        .await
    }

    pub async fn load_more(&self) -> bool {
        let (can_load, offset) = {
            let state = self.state.borrow();
            (state.can_load_more(), state.next_offset())
        };
        if !can_load {
            return false;
        }

        let filters = {
            let mut current = lock(&self.filters);
            current.offset = offset;
            current.clone()
        };
        self.run(filters).await
    }

    /// Trigger ingestion of `category`, wait, then re-fetch page one.
    pub async fn refresh_category(&self, category: BusinessCategory) -> Result<RefreshAck, ClientError> {
        let ack = run_trigger(&self.state, self.api.refresh_category(category)).await?;

        tokio::time::sleep(self.config.refresh_refetch_delay()).await;
        self.refine(|_| {}).await;
        // Counts changed as well
        self.load_categories().await?;
        Ok(ack)
    }
}
