//! Client side of the directory: a typed API client and the state hooks a
//! map view is rendered from.

pub mod api;
pub mod debounce;
pub mod geolocation;
pub mod hooks;
pub mod state;
pub mod view;

pub use api::{ApiClient, ClientError, HealthReport};
pub use debounce::Debouncer;
pub use geolocation::{
    FixedLocationProvider, GeocodedLocationProvider, GeolocationError, GeolocationHook,
    LocationProvider, LocationState,
};
pub use hooks::{BusinessesHook, StoresHook, StoresQuery};
pub use state::{FetchTicket, ListState};
pub use view::ViewState;
