use crate::client::state::ListState;
use crate::map::MapProvider;
use crate::models::{Business, Coordinates, DistanceKm};

pub const EMPTY_MESSAGE: &str = "No places match your search.";

/// What a result view shows. Exactly one variant applies to any state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewState<'a, T> {
    Loading,
    Error(&'a str),
    Empty,
    Results(&'a [T]),
}

impl<'a, T> ViewState<'a, T> {
    /// Loading wins over everything; an error wins over stale items.
    pub fn of(state: &'a ListState<T>) -> Self {
        if state.loading {
            ViewState::Loading
        } else if let Some(ref error) = state.error {
            ViewState::Error(error)
        } else if state.items.is_empty() {
            ViewState::Empty
        } else {
            ViewState::Results(&state.items)
        }
    }

    pub fn is_results(&self) -> bool {
        matches!(self, ViewState::Results(_))
    }
}

/// `1.25km` / `400m`, or nothing without a distance.
pub fn distance_label(business: &Business) -> Option<String> {
    business.distance_km.map(|km| DistanceKm(km).to_string())
}

/// One line per result, as the list view prints it.
pub fn summary_line(business: &Business) -> String {
    let mut line = format!("{} {}", business.category.icon(), business.name);
    if let Some(ref address) = business.formatted_address {
        line.push_str(&format!(" · {}", address));
    }
    if let Some(rating) = business.rating {
        line.push_str(&format!(" · ★ {:.1}", rating));
    }
    if let Some(distance) = distance_label(business) {
        line.push_str(&format!(" · {}", distance));
    }
    if business.permanently_closed {
        line.push_str(" · closed");
    }
    line
}

/// External directions page for `business`, from `origin` when known.
pub fn directions_link(
    provider: &dyn MapProvider,
    origin: Option<Coordinates>,
    business: &Business,
) -> String {
    provider.directions_url(origin, business.coordinates())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::OsmProvider;
    use crate::models::{BusinessCategory, Identified, Page};

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64);

    impl Identified for Item {
        fn key(&self) -> i64 {
            self.0
        }
    }

    fn sample() -> Business {
        serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "Lidl Qormi",
            "latitude": 35.8794,
            "longitude": 14.4722,
            "category": "grocery",
            "formatted_address": "Triq il-Kbira, Qormi",
            "phone_number": null,
            "website": null,
            "email": null,
            "rating": 4.2,
            "user_ratings_total": null,
            "price_level": null,
            "business_status": null,
            "opening_hours": null,
            "brand": null,
            "operator": null,
            "created_at": "2024-05-01T10:00:00Z",
            "distance_km": 1.25
        }))
        .unwrap()
    }

    #[test]
    fn states_are_exclusive_and_exhaustive() {
        let mut state = ListState::<Item>::default();
        assert_eq!(ViewState::of(&state), ViewState::Empty);

        let ticket = state.begin(0);
        assert_eq!(ViewState::of(&state), ViewState::Loading);

        state.finish(ticket, Ok::<_, String>(Page::new(vec![Item(1)], 1, 0, 50)));
        assert!(ViewState::of(&state).is_results());

        let ticket = state.begin(0);
        state.finish(ticket, Err::<Page<Item>, _>("Unable to reach the server"));
        assert_eq!(
            ViewState::of(&state),
            ViewState::Error("Unable to reach the server")
        );
    }

    #[test]
    fn summary_line_shows_known_fields() {
        let line = summary_line(&sample());
        assert_eq!(line, "🛒 Lidl Qormi · Triq il-Kbira, Qormi · ★ 4.2 · 1.25km");
        assert_eq!(sample().category, BusinessCategory::Grocery);
    }

    #[test]
    fn directions_link_uses_provider() {
        let link = directions_link(&OsmProvider::new(), None, &sample());
        assert!(link.starts_with("https://www.openstreetmap.org/directions?route="));
        assert!(link.ends_with("35.8794%2C14.4722"));
    }
}
