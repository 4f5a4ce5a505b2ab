use crate::map::{MapError, MapProvider};
use crate::models::Coordinates;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeolocationError {
    #[error("Location permission denied. Please allow location access to find places near you.")]
    PermissionDenied,

    #[error("Your location is currently unavailable.")]
    PositionUnavailable,

    #[error("Locating you took too long. Please try again.")]
    Timeout,

    #[error("Could not determine your location: {0}")]
    Unknown(String),
}

/// Source of the user's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Always answers with the same outcome. Used for a configured home
/// position and in tests.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    outcome: Result<Coordinates, GeolocationError>,
}

impl FixedLocationProvider {
    pub fn new(position: Coordinates) -> Self {
        FixedLocationProvider {
            outcome: Ok(position),
        }
    }

    pub fn failing(error: GeolocationError) -> Self {
        FixedLocationProvider {
            outcome: Err(error),
        }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        self.outcome.clone()
    }
}

/// Resolves a typed place name through the map provider's geocoder.
pub struct GeocodedLocationProvider {
    map: Arc<dyn MapProvider>,
    place: String,
}

impl GeocodedLocationProvider {
    pub fn new(map: Arc<dyn MapProvider>, place: impl Into<String>) -> Self {
        GeocodedLocationProvider {
            map,
            place: place.into(),
        }
    }
}

#[async_trait]
impl LocationProvider for GeocodedLocationProvider {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        match self.map.geocode(&self.place).await {
            Ok(Some(position)) => Ok(position),
            Ok(None) => Err(GeolocationError::PositionUnavailable),
            Err(MapError::Http { status: 401 | 403, .. }) => Err(GeolocationError::PermissionDenied),
            Err(MapError::Timeout) => Err(GeolocationError::Timeout),
            Err(e) => Err(GeolocationError::Unknown(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationState {
    pub position: Option<Coordinates>,
    pub loading: bool,
    pub error: Option<String>,
    /// Generation of the latest lookup
    pub generation: u64,
}

pub struct GeolocationHook<P: LocationProvider> {
    provider: P,
    timeout: Duration,
    state: watch::Sender<LocationState>,
}

impl<P: LocationProvider> GeolocationHook<P> {
    pub fn new(provider: P, timeout: Duration) -> Self {
        let (state, _) = watch::channel(LocationState::default());
        GeolocationHook {
            provider,
            timeout,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> LocationState {
        self.state.borrow().clone()
    }

    /// Look up the current position within the timeout. A failure keeps
    /// the last known position but records the error. Only the latest
    /// lookup updates the state; an overtaken one still returns its outcome.
    pub async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.loading = true;
            s.error = None;
        });

        let outcome = match tokio::time::timeout(self.timeout, self.provider.current_position()).await {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout),
        };

        let applied = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.loading = false;
            match &outcome {
                Ok(position) => s.position = Some(*position),
                Err(e) => s.error = Some(e.to_string()),
            }
            true
        });

        if !applied {
            tracing::debug!("Discarding superseded location lookup {}", generation);
        } else if let Err(ref e) = outcome {
            tracing::warn!("Geolocation failed: {}", e);
        }
        outcome
    }
}
