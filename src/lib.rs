pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod platform;
pub mod station;
pub mod store;
pub mod weather;

pub use config::Config;
pub use error::ConnectorError;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn store::ConnectorStore>,
    pub oauth: platform::LegionOAuth,
    pub platform: platform::LegionApi,
    pub weather: weather::WeatherClient,
}

pub type SharedState = Arc<AppState>;
