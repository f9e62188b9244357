//! Connector state — sessions, pending OAuth states, and platform caches.
//!
//! Everything here is process-local and volatile: a restart drops all of it
//! and connected organizations must re-authorize. The `ConnectorStore` trait
//! keeps request handlers independent of the backing implementation so a
//! persistent store can be substituted later.

pub mod memory;
pub mod sweep;

pub use memory::MemoryStore;
pub use sweep::state_sweeper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::platform::TokenSet;

/// An organization's OAuth session, created on successful token exchange.
#[derive(Debug, Clone, Serialize)]
pub struct OrgSession {
    pub tokens: TokenSet,
    /// Absolute expiry of the access token, when the platform reported one.
    pub expires_at: Option<DateTime<Utc>>,
    pub activated_at: DateTime<Utc>,
}

impl OrgSession {
    pub fn new(tokens: TokenSet) -> Self {
        let expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));
        Self {
            tokens,
            expires_at,
            activated_at: Utc::now(),
        }
    }

    /// Whether the access token is expired or about to expire. The margin
    /// leaves room for the outbound call the token is being fetched for.
    pub fn needs_refresh(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(at) => {
                let margin =
                    chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
                Utc::now() + margin >= at
            }
            None => false,
        }
    }
}

/// A pending authorization attempt, keyed by the random state token carried
/// through the redirect. Consumed exactly once by the callback.
#[derive(Debug, Clone)]
pub struct PendingState {
    pub organization_id: String,
    pub created_at: DateTime<Utc>,
}

/// Storage operations the request handlers depend on.
#[async_trait]
pub trait ConnectorStore: Send + Sync {
    // ── Organization sessions ───────────────────────────────────────────
    async fn put_session(&self, org_id: &str, session: OrgSession);
    async fn get_session(&self, org_id: &str) -> Option<OrgSession>;
    async fn remove_session(&self, org_id: &str) -> Option<OrgSession>;
    async fn connected_organizations(&self) -> Vec<String>;

    // ── Pending OAuth states ────────────────────────────────────────────
    async fn put_state(&self, state: &str, pending: PendingState);
    /// Remove and return the entry, so a state token can never be replayed.
    async fn take_state(&self, state: &str) -> Option<PendingState>;
    /// Drop states older than `max_age`; returns how many were removed.
    async fn sweep_states(&self, max_age: Duration) -> usize;

    // ── Station cache ───────────────────────────────────────────────────
    async fn cached_stations(&self, org_id: &str) -> Vec<Value>;
    async fn cache_stations(&self, org_id: &str, stations: Vec<Value>);
    async fn append_station(&self, org_id: &str, station: Value);
    async fn remove_station(&self, org_id: &str, station_id: &str);
    async fn clear_stations(&self, org_id: &str);

    // ── Feed-definition cache ───────────────────────────────────────────
    async fn get_feed_definition(&self, key: &str) -> Option<Value>;
    async fn put_feed_definition(&self, key: &str, definition: Value);
    /// Drop every cached definition whose key starts with `{org_id}-`.
    async fn clear_feed_definitions(&self, org_id: &str);

    // ── Lifecycle ───────────────────────────────────────────────────────
    async fn clear_all(&self);
}
