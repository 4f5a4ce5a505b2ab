//! Result-set state shared by the client hooks.
//!
//! Every fetch is tagged with a [`FetchTicket`]. Only the most recently
//! issued ticket may write its outcome, so a slow response to a superseded
//! request can never overwrite a newer result.

use crate::models::{Identified, Page};
use std::collections::HashSet;
use std::fmt::Display;

/// Handle for one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub offset: u32,
}

impl FetchTicket {
    /// Offset > 0 continues the current query
    pub fn appends(&self) -> bool {
        self.offset > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub total: u64,
    pub has_more: bool,
    /// Generation of the latest issued fetch
    pub generation: u64,
    /// Server-side offset just past the last page received. Ahead of
    /// `items.len()` when an appended page repeated ids.
    pub cursor: u32,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        ListState {
            items: Vec::new(),
            loading: false,
            error: None,
            total: 0,
            has_more: false,
            generation: 0,
            cursor: 0,
        }
    }
}

impl<T: Identified> ListState<T> {
    pub fn begin(&mut self, offset: u32) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        FetchTicket {
            generation: self.generation,
            offset,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply the outcome of `ticket`. Returns `false`, leaving the state
    /// untouched, when a newer fetch has been issued since.
    pub fn finish<E: Display>(&mut self, ticket: FetchTicket, outcome: Result<Page<T>, E>) -> bool {
        if !self.is_current(&ticket) {
            tracing::debug!(
                "Discarding stale response (generation {} < {})",
                ticket.generation,
                self.generation
            );
            return false;
        }

        match outcome {
            Ok(page) => {
                self.cursor = ticket.offset + page.items.len() as u32;
                if ticket.appends() {
                    let mut seen: HashSet<i64> = self.items.iter().map(Identified::key).collect();
                    self.items
                        .extend(page.items.into_iter().filter(|item| seen.insert(item.key())));
                } else {
                    self.items = page.items;
                }
                self.total = page.total;
                self.has_more = page.has_more;
                self.error = None;
            }
            Err(e) => {
                self.items.clear();
                self.cursor = 0;
                self.total = 0;
                self.has_more = false;
                self.error = Some(e.to_string());
            }
        }
        self.loading = false;
        true
    }

    /// Offset of the next page of the current query
    pub fn next_offset(&self) -> u32 {
        self.cursor
    }

    pub fn can_load_more(&self) -> bool {
        self.has_more && !self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64);

    impl Identified for Item {
        fn key(&self) -> i64 {
            self.0
        }
    }

    fn page(ids: std::ops::Range<i64>, total: u64, offset: u32) -> Page<Item> {
        let items: Vec<Item> = ids.map(Item).collect();
        let limit = items.len() as u32;
        Page::new(items, total, offset, limit)
    }

    fn ids(state: &ListState<Item>) -> Vec<i64> {
        state.items.iter().map(|i| i.0).collect()
    }

    #[test]
    fn begin_sets_loading_and_clears_error() {
        let mut state = ListState::<Item> {
            error: Some("boom".to_string()),
            ..Default::default()
        };
        let ticket = state.begin(0);
        assert!(state.loading);
        assert_eq!(state.error, None);
        assert_eq!(ticket.generation, 1);
        assert!(!ticket.appends());
    }

    #[test]
    fn offset_zero_replaces() {
        let mut state = ListState::default();
        let t = state.begin(0);
        state.finish(t, Ok::<_, String>(page(1..4, 3, 0)));
        let t = state.begin(0);
        state.finish(t, Ok::<_, String>(page(10..12, 2, 0)));
        assert_eq!(ids(&state), vec![10, 11]);
        assert!(!state.loading);
    }

    #[test]
    fn pagination_sequence_over_120_records() {
        let mut state = ListState::default();

        let t = state.begin(0);
        state.finish(t, Ok::<_, String>(page(0..50, 120, 0)));
        assert!(state.has_more);

        let t = state.begin(state.next_offset());
        assert_eq!(t.offset, 50);
        state.finish(t, Ok::<_, String>(page(50..100, 120, 50)));
        assert!(state.has_more);
        assert_eq!(state.items.len(), 100);

        let t = state.begin(state.next_offset());
        state.finish(t, Ok::<_, String>(page(100..120, 120, 100)));
        assert!(!state.has_more);
        assert_eq!(state.items.len(), 120);
        assert_eq!(state.total, 120);
    }

    #[test]
    fn append_skips_ids_already_present() {
        let mut state = ListState::default();
        let t = state.begin(0);
        state.finish(t, Ok::<_, String>(page(0..3, 5, 0)));
        let t = state.begin(3);
        state.finish(t, Ok::<_, String>(page(2..5, 5, 3)));
        assert_eq!(ids(&state), vec![0, 1, 2, 3, 4]);
        // Continues after the server's window, not after the local count
        assert_eq!(state.next_offset(), 6);
    }

    #[test]
    fn failure_clears_results() {
        let mut state = ListState::default();
        let t = state.begin(0);
        state.finish(t, Ok::<_, String>(page(0..10, 10, 0)));

        let t = state.begin(0);
        state.finish(t, Err::<Page<Item>, _>("Unable to reach the server"));
        assert!(state.items.is_empty());
        assert_eq!(state.total, 0);
        assert!(!state.has_more);
        assert_eq!(state.error.as_deref(), Some("Unable to reach the server"));
        assert!(!state.loading);
        assert_eq!(state.next_offset(), 0);
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut state = ListState::default();
        let old = state.begin(0);
        let new = state.begin(0);

        assert!(state.finish(new, Ok::<_, String>(page(10..12, 2, 0))));
        assert!(!state.finish(old, Ok::<_, String>(page(0..5, 5, 0))));
        assert_eq!(ids(&state), vec![10, 11]);

        // A stale failure does not clear a newer result either
        assert!(!state.finish(old, Err::<Page<Item>, _>("late failure")));
        assert_eq!(state.error, None);
    }

    #[test]
    fn stale_response_keeps_newer_fetch_loading() {
        let mut state = ListState::default();
        let old = state.begin(0);
        let _new = state.begin(0);
        state.finish(old, Ok::<_, String>(page(0..5, 5, 0)));
        assert!(state.loading);
        assert!(!state.can_load_more());
    }
}
