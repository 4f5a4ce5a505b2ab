// Library exports for the server, the binaries and the tests

pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod map;
pub mod models;
pub mod osm;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use error::{AppError, Result};

use services::DirectoryService;

// App state for sharing across the application
pub struct AppState {
    pub directory: DirectoryService,
}
