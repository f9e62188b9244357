//! Request handlers.
//!
//! All handlers receive `SharedState` via Axum state extraction. The OAuth
//! flow is orchestrated here; the platform and weather clients do the
//! outbound calls.

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use rand::RngCore;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::auth::decode_organization_id;
use crate::error::ConnectorError;
use crate::station;
use crate::store::{OrgSession, PendingState};
use crate::SharedState;

/// How close to expiry an access token may get before it is refreshed ahead
/// of an outbound call.
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

pub fn app_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        .route("/health", get(health))
        // ── OAuth ────────────────────────────────────────────────────────
        .route("/connect", get(connect))
        .route("/oauth/callback", get(oauth_callback))
        .route("/oauth/disconnect", post(oauth_disconnect))
        // ── Weather relay ────────────────────────────────────────────────
        .route("/api/weather/{org_id}", get(weather_current))
        // ── Weather stations ─────────────────────────────────────────────
        .route("/api/weather-stations/{org_id}", get(stations_list))
        .route("/api/weather-stations/{org_id}", post(stations_create))
        .route(
            "/api/weather-stations/{org_id}/{station_id}/update",
            post(stations_update),
        )
        .route(
            "/api/weather-stations/{org_id}/{station_id}",
            delete(stations_delete),
        )
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    let connected = state.store.connected_organizations().await;
    Json(json!({
        "status": "ok",
        "service": "legion-weather-connector",
        "version": env!("CARGO_PKG_VERSION"),
        "connected_organizations": connected,
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

// =============================================================================
// Session helper
// =============================================================================

/// Resolve an organization's access token, refreshing it when it is within
/// the margin of expiry. A dead refresh grant surfaces as a 401.
async fn require_session(
    state: &SharedState,
    org_id: &str,
) -> Result<String, ConnectorError> {
    let session = state
        .store
        .get_session(org_id)
        .await
        .ok_or(ConnectorError::Unauthorized)?;

    if !session.needs_refresh(REFRESH_MARGIN) {
        return Ok(session.tokens.access_token);
    }

    let refresh_token = session
        .tokens
        .refresh_token
        .clone()
        .ok_or(ConnectorError::SessionExpired)?;

    info!("Access token for {org_id} near expiry, refreshing");
    let mut tokens = state.oauth.refresh(&refresh_token).await?;
    // The platform does not always rotate the refresh token.
    if tokens.refresh_token.is_none() {
        tokens.refresh_token = Some(refresh_token);
    }

    let access_token = tokens.access_token.clone();
    state.store.put_session(org_id, OrgSession::new(tokens)).await;
    Ok(access_token)
}

// =============================================================================
// OAuth flow
// =============================================================================

#[derive(Deserialize)]
struct ConnectQuery {
    org_id: Option<String>,
}

/// GET /connect — redirect the user to the platform's authorization page.
async fn connect(
    State(state): State<SharedState>,
    Query(q): Query<ConnectQuery>,
) -> Result<Response, ConnectorError> {
    let org_id = q
        .org_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConnectorError::BadRequest("org_id query parameter is required".into()))?;

    let state_token = random_state();
    state
        .store
        .put_state(
            &state_token,
            PendingState {
                organization_id: org_id.to_string(),
                created_at: Utc::now(),
            },
        )
        .await;

    let url = state.oauth.authorization_url(org_id, &state_token)?;
    info!("Redirecting organization {org_id} to authorization server");
    Ok(Redirect::temporary(&url).into_response())
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /oauth/callback — exchange the authorization code and store the
/// session.
async fn oauth_callback(
    State(state): State<SharedState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Html<String>, ConnectorError> {
    // An upstream denial needs no exchange; pass the message through.
    if let Some(error) = q.error {
        return Err(ConnectorError::BadRequest(
            q.error_description.unwrap_or(error),
        ));
    }

    let code = q
        .code
        .ok_or_else(|| ConnectorError::BadRequest("code query parameter is required".into()))?;

    // Consume the pending state, if this flow was initiated by us. A missing
    // entry is legal: the flow may have been started by an external caller
    // that never registered a state token here.
    let pending = match q.state.as_deref() {
        Some(token) => state.store.take_state(token).await,
        None => None,
    };

    let tokens = state.oauth.exchange_code(&code).await?;

    let org_id = pending
        .map(|p| p.organization_id)
        .or_else(|| decode_organization_id(&tokens.access_token))
        .ok_or_else(|| {
            ConnectorError::FlowError(
                "could not resolve an organization id from state or token claims".into(),
            )
        })?;

    state
        .store
        .put_session(&org_id, OrgSession::new(tokens))
        .await;
    info!("Organization {org_id} connected");

    Ok(Html(success_page(&org_id)))
}

#[derive(Deserialize)]
struct DisconnectBody {
    organization_id: String,
}

/// POST /oauth/disconnect — drop the session and all caches for an
/// organization.
async fn oauth_disconnect(
    State(state): State<SharedState>,
    Json(body): Json<DisconnectBody>,
) -> Result<Json<serde_json::Value>, ConnectorError> {
    let org_id = &body.organization_id;

    state
        .store
        .remove_session(org_id)
        .await
        .ok_or_else(|| ConnectorError::NotFound(format!("Integration for '{org_id}'")))?;

    state.store.clear_stations(org_id).await;
    state.store.clear_feed_definitions(org_id).await;
    info!("Organization {org_id} disconnected");

    Ok(Json(json!({ "data": { "disconnected": org_id } })))
}

// =============================================================================
// Weather relay
// =============================================================================

#[derive(Deserialize)]
struct WeatherQuery {
    city: Option<String>,
    units: Option<String>,
}

/// GET /api/weather/:org_id — current conditions for a city.
async fn weather_current(
    State(state): State<SharedState>,
    Path(org_id): Path<String>,
    Query(q): Query<WeatherQuery>,
) -> Result<Json<serde_json::Value>, ConnectorError> {
    require_session(&state, &org_id).await?;

    let city = q
        .city
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConnectorError::BadRequest("city query parameter is required".into()))?;
    let units = q.units.as_deref().unwrap_or("metric");

    let current = state.weather.fetch_current(city, units).await?;
    Ok(Json(json!({ "data": current })))
}

// =============================================================================
// Weather stations
// =============================================================================

async fn stations_list(
    State(state): State<SharedState>,
    Path(org_id): Path<String>,
) -> Result<Json<serde_json::Value>, ConnectorError> {
    let token = require_session(&state, &org_id).await?;

    let stations =
        station::list_stations(state.store.as_ref(), &state.platform, &token, &org_id).await?;
    Ok(Json(json!({ "data": stations })))
}

#[derive(Deserialize)]
struct CreateStationBody {
    city: Option<String>,
}

async fn stations_create(
    State(state): State<SharedState>,
    Path(org_id): Path<String>,
    Json(body): Json<CreateStationBody>,
) -> Result<Json<serde_json::Value>, ConnectorError> {
    let token = require_session(&state, &org_id).await?;

    let city = body
        .city
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConnectorError::BadRequest("city is required".into()))?;

    let entity = station::create_station(
        state.store.as_ref(),
        &state.platform,
        &state.weather,
        &token,
        &org_id,
        city,
    )
    .await?;
    Ok(Json(json!({ "data": entity })))
}

async fn stations_update(
    State(state): State<SharedState>,
    Path((org_id, station_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ConnectorError> {
    let token = require_session(&state, &org_id).await?;

    let reading = station::update_station_weather(
        state.store.as_ref(),
        &state.platform,
        &state.weather,
        &token,
        &org_id,
        &station_id,
    )
    .await?;
    Ok(Json(json!({ "data": reading })))
}

async fn stations_delete(
    State(state): State<SharedState>,
    Path((org_id, station_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ConnectorError> {
    let token = require_session(&state, &org_id).await?;

    station::delete_station(
        state.store.as_ref(),
        &state.platform,
        &token,
        &org_id,
        &station_id,
    )
    .await?;
    Ok(Json(json!({ "data": { "deleted": station_id } })))
}

// =============================================================================
// Helpers
// =============================================================================

/// 32 hex chars of CSPRNG entropy for the OAuth state parameter.
fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn success_page(org_id: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>Integration connected</title></head>
  <body style="font-family: sans-serif; text-align: center; padding-top: 4rem;">
    <h1>&#10003; Integration connected</h1>
    <p>Organization <strong>{org_id}</strong> is now authorized.</p>
    <p>You can close this window.</p>
  </body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_state_is_32_hex_chars() {
        let state = random_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_state_is_unique_per_call() {
        assert_ne!(random_state(), random_state());
    }

    #[test]
    fn test_success_page_names_the_organization() {
        let page = success_page("org-1");
        assert!(page.contains("org-1"));
        assert!(page.contains("Integration connected"));
    }
}
