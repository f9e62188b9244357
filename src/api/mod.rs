//! HTTP router for the connector.
//!
//! Endpoint groups:
//! - `/connect`, `/oauth/*` — authorization-code flow and disconnect
//! - `/api/weather/*` — current-conditions relay
//! - `/api/weather-stations/*` — station registry
//! - `/status`, `/health` — service metadata and liveness

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::app_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
