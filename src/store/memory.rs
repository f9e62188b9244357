//! In-memory `ConnectorStore` backed by `RwLock<HashMap>` per collection.
//!
//! Stands in for a real datastore: unbounded, no eviction beyond the state
//! sweep, nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{ConnectorStore, OrgSession, PendingState};

#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, OrgSession>>,
    states: RwLock<HashMap<String, PendingState>>,
    stations: RwLock<HashMap<String, Vec<Value>>>,
    feed_definitions: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectorStore for MemoryStore {
    async fn put_session(&self, org_id: &str, session: OrgSession) {
        self.sessions.write().await.insert(org_id.to_string(), session);
    }

    async fn get_session(&self, org_id: &str) -> Option<OrgSession> {
        self.sessions.read().await.get(org_id).cloned()
    }

    async fn remove_session(&self, org_id: &str) -> Option<OrgSession> {
        self.sessions.write().await.remove(org_id)
    }

    async fn connected_organizations(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    async fn put_state(&self, state: &str, pending: PendingState) {
        self.states.write().await.insert(state.to_string(), pending);
    }

    async fn take_state(&self, state: &str) -> Option<PendingState> {
        self.states.write().await.remove(state)
    }

    async fn sweep_states(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, pending| pending.created_at > cutoff);
        before - states.len()
    }

    async fn cached_stations(&self, org_id: &str) -> Vec<Value> {
        self.stations.read().await.get(org_id).cloned().unwrap_or_default()
    }

    async fn cache_stations(&self, org_id: &str, list: Vec<Value>) {
        self.stations.write().await.insert(org_id.to_string(), list);
    }

    async fn append_station(&self, org_id: &str, station: Value) {
        self.stations
            .write()
            .await
            .entry(org_id.to_string())
            .or_default()
            .push(station);
    }

    async fn remove_station(&self, org_id: &str, station_id: &str) {
        if let Some(list) = self.stations.write().await.get_mut(org_id) {
            list.retain(|entity| {
                entity.get("id").and_then(Value::as_str) != Some(station_id)
            });
        }
    }

    async fn clear_stations(&self, org_id: &str) {
        self.stations.write().await.remove(org_id);
    }

    async fn get_feed_definition(&self, key: &str) -> Option<Value> {
        self.feed_definitions.read().await.get(key).cloned()
    }

    async fn put_feed_definition(&self, key: &str, definition: Value) {
        self.feed_definitions
            .write()
            .await
            .insert(key.to_string(), definition);
    }

    async fn clear_feed_definitions(&self, org_id: &str) {
        let prefix = format!("{org_id}-");
        self.feed_definitions
            .write()
            .await
            .retain(|key, _| !key.starts_with(&prefix));
    }

    async fn clear_all(&self) {
        self.sessions.write().await.clear();
        self.states.write().await.clear();
        self.stations.write().await.clear();
        self.feed_definitions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TokenSet;
    use serde_json::json;

    fn test_session() -> OrgSession {
        OrgSession::new(TokenSet {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            token_type: "Bearer".into(),
            expires_in: Some(3600),
            scope: None,
        })
    }

    #[tokio::test]
    async fn test_state_consumed_exactly_once() {
        let store = MemoryStore::new();
        store
            .put_state(
                "abc123",
                PendingState {
                    organization_id: "org-1".into(),
                    created_at: Utc::now(),
                },
            )
            .await;

        let first = store.take_state("abc123").await;
        assert_eq!(first.unwrap().organization_id, "org-1");

        // Second consumption must miss — replayed callbacks fall through to
        // claim decoding instead of reusing the original organization id.
        assert!(store.take_state("abc123").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired_states() {
        let store = MemoryStore::new();
        store
            .put_state(
                "old",
                PendingState {
                    organization_id: "org-1".into(),
                    created_at: Utc::now() - chrono::Duration::hours(2),
                },
            )
            .await;
        store
            .put_state(
                "fresh",
                PendingState {
                    organization_id: "org-2".into(),
                    created_at: Utc::now(),
                },
            )
            .await;

        let removed = store.sweep_states(Duration::from_secs(3600)).await;
        assert_eq!(removed, 1);
        assert!(store.take_state("old").await.is_none());
        assert!(store.take_state("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_station_filters_by_id() {
        let store = MemoryStore::new();
        store
            .cache_stations(
                "org-1",
                vec![json!({"id": "st-1"}), json!({"id": "st-2"})],
            )
            .await;

        store.remove_station("org-1", "st-1").await;
        let remaining = store.cached_stations("org-1").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["id"], "st-2");
    }

    #[tokio::test]
    async fn test_clear_stations_empties_cache_for_refetch() {
        let store = MemoryStore::new();
        store.cache_stations("org-1", vec![json!({"id": "st-1"})]).await;

        store.clear_stations("org-1").await;
        // An empty cache is the signal for the registry to search remotely
        // instead of serving stale entries.
        assert!(store.cached_stations("org-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_feed_definitions_is_prefix_scoped() {
        let store = MemoryStore::new();
        store
            .put_feed_definition("org-1-weather-observations", json!({"id": "fd-1"}))
            .await;
        store
            .put_feed_definition("org-2-weather-observations", json!({"id": "fd-2"}))
            .await;

        store.clear_feed_definitions("org-1").await;
        assert!(store
            .get_feed_definition("org-1-weather-observations")
            .await
            .is_none());
        assert!(store
            .get_feed_definition("org-2-weather-observations")
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_session_roundtrip_and_removal() {
        let store = MemoryStore::new();
        store.put_session("org-1", test_session()).await;

        assert!(store.get_session("org-1").await.is_some());
        assert_eq!(store.connected_organizations().await, vec!["org-1"]);

        assert!(store.remove_session("org-1").await.is_some());
        assert!(store.remove_session("org-1").await.is_none());
    }

    #[test]
    fn test_needs_refresh_margin() {
        let mut session = test_session();
        assert!(!session.needs_refresh(Duration::from_secs(30)));

        session.expires_at = Some(Utc::now() + chrono::Duration::seconds(10));
        assert!(session.needs_refresh(Duration::from_secs(30)));

        // No reported expiry: nothing to refresh against.
        session.expires_at = None;
        assert!(!session.needs_refresh(Duration::from_secs(30)));
    }
}
