use serde_json::Value;

use crate::config::Config;
use crate::error::ConnectorError;

/// REST client for the Legion entity and feed APIs. Every call is made on
/// behalf of an organization with that organization's access token.
pub struct LegionApi {
    base: String,
    http: reqwest::Client,
}

impl LegionApi {
    pub fn new(config: &Config) -> Self {
        Self {
            base: config.legion_api_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    // ── Entities ────────────────────────────────────────────────────────

    /// Search entities by category and type. A 404 from the platform means
    /// "none yet", not an error.
    pub async fn search_entities(
        &self,
        token: &str,
        category: &str,
        entity_type: &str,
    ) -> Result<Vec<Value>, ConnectorError> {
        let resp = self
            .http
            .get(format!("{}/entities", self.base))
            .query(&[("category", category), ("type", entity_type)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Entity search failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!(
                "Entity search failed: {body}"
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Invalid entity search response: {e}")))?;
        Ok(normalize_entity_results(body))
    }

    pub async fn create_entity(
        &self,
        token: &str,
        entity: &Value,
    ) -> Result<Value, ConnectorError> {
        let resp = self
            .http
            .post(format!("{}/entities", self.base))
            .bearer_auth(token)
            .json(entity)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Entity creation failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!(
                "Entity creation failed: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Invalid entity response: {e}")))
    }

    pub async fn get_entity(&self, token: &str, id: &str) -> Result<Value, ConnectorError> {
        let resp = self
            .http
            .get(format!("{}/entities/{id}", self.base))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Entity fetch failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ConnectorError::NotFound(format!("Station '{id}'")));
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!(
                "Entity fetch failed: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Invalid entity response: {e}")))
    }

    pub async fn delete_entity(&self, token: &str, id: &str) -> Result<(), ConnectorError> {
        let resp = self
            .http
            .delete(format!("{}/entities/{id}", self.base))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Entity deletion failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ConnectorError::NotFound(format!("Station '{id}'")));
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!(
                "Entity deletion failed: {body}"
            )));
        }
        Ok(())
    }

    /// Attach a point location to an entity.
    pub async fn set_entity_location(
        &self,
        token: &str,
        id: &str,
        location: &Value,
    ) -> Result<(), ConnectorError> {
        let resp = self
            .http
            .put(format!("{}/entities/{id}/location", self.base))
            .bearer_auth(token)
            .json(location)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Location update failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!(
                "Location update failed: {body}"
            )));
        }
        Ok(())
    }

    // ── Feeds ───────────────────────────────────────────────────────────

    pub async fn find_feed_definitions(
        &self,
        token: &str,
        feed_type: &str,
    ) -> Result<Vec<Value>, ConnectorError> {
        let resp = self
            .http
            .get(format!("{}/feed-definitions", self.base))
            .query(&[("type", feed_type)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Feed definition search failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!(
                "Feed definition search failed: {body}"
            )));
        }

        let body: Value = resp.json().await.map_err(|e| {
            ConnectorError::Upstream(format!("Invalid feed definition response: {e}"))
        })?;
        Ok(normalize_entity_results(body))
    }

    pub async fn create_feed_definition(
        &self,
        token: &str,
        definition: &Value,
    ) -> Result<Value, ConnectorError> {
        let resp = self
            .http
            .post(format!("{}/feed-definitions", self.base))
            .bearer_auth(token)
            .json(definition)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Feed definition creation failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!(
                "Feed definition creation failed: {body}"
            )));
        }

        resp.json().await.map_err(|e| {
            ConnectorError::Upstream(format!("Invalid feed definition response: {e}"))
        })
    }

    pub async fn push_feed_message(
        &self,
        token: &str,
        definition_id: &str,
        message: &Value,
    ) -> Result<(), ConnectorError> {
        let resp = self
            .http
            .post(format!("{}/feeds/{definition_id}/messages", self.base))
            .bearer_auth(token)
            .json(message)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Feed push failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Upstream(format!("Feed push failed: {body}")));
        }
        Ok(())
    }
}

/// The platform returns list endpoints either as a `{"results": [...]}`
/// envelope or as a bare array, depending on deployment version. Flatten both
/// into a plain list; anything else is an empty result.
pub(crate) fn normalize_entity_results(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
