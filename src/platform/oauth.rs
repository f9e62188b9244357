use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ConnectorError;

/// A set of tokens returned by the platform after code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

/// OAuth 2.0 client for the Legion authorization server.
///
/// Quirks:
/// - The authorization URL carries an `organization_id` parameter in addition
///   to the standard code-flow parameters.
/// - The token endpoint convention varies between deployments. The primary
///   endpoint is tried with a JSON body; if it rejects the exchange, a
///   fallback endpoint is derived from the platform's advertised
///   authorization URL and retried once with a form-encoded body.
pub struct LegionOAuth {
    api_base: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AuthorizationUrlResponse {
    url: String,
}

impl LegionOAuth {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base: config.legion_api_url.trim_end_matches('/').to_string(),
            client_id: config.legion_client_id.clone(),
            client_secret: config.legion_client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri.clone(),
            http: reqwest::Client::new(),
        }
    }

    fn require_client_id(&self) -> Result<&str, ConnectorError> {
        self.client_id
            .as_deref()
            .ok_or_else(|| ConnectorError::Config("LEGION_CLIENT_ID is not set".into()))
    }

    fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.api_base)
    }

    /// Build the authorization URL the user is redirected to.
    pub fn authorization_url(
        &self,
        organization_id: &str,
        state: &str,
    ) -> Result<String, ConnectorError> {
        let client_id = self.require_client_id()?;
        Ok(format!(
            "{base}/oauth2/auth?\
             response_type=code\
             &client_id={client_id}\
             &organization_id={organization_id}\
             &redirect_uri={redirect_uri}\
             &state={state}",
            base = self.api_base,
            client_id = urlencode(client_id),
            organization_id = urlencode(organization_id),
            redirect_uri = urlencode(&self.redirect_uri),
            state = urlencode(state),
        ))
    }

    /// Exchange an authorization code for a token set.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, ConnectorError> {
        let client_id = self.require_client_id()?.to_string();

        let primary = self.token_endpoint();
        let primary_err = match self.request_tokens_json(&primary, &client_id, code).await {
            Ok(tokens) => return Ok(tokens),
            Err(e) => e,
        };
        warn!("Primary token endpoint rejected the exchange: {primary_err}");

        // One derived retry. The platform advertises its authorization URL;
        // rewriting it into a token URL is a heuristic, not a protocol
        // guarantee.
        let authorization_url = self.fetch_authorization_url().await?;
        let fallback = derive_token_endpoint(&authorization_url).ok_or_else(|| {
            ConnectorError::FlowError(format!(
                "{primary_err}; no fallback endpoint could be derived from '{authorization_url}'"
            ))
        })?;
        info!("Retrying token exchange against derived endpoint {fallback}");
        self.request_tokens_form(&fallback, &client_id, code).await
    }

    /// Refresh an access token. A rejection that indicates a dead grant maps
    /// to `SessionExpired` so callers can tell the organization to reconnect.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ConnectorError> {
        let client_id = self.require_client_id()?.to_string();

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let resp = self
            .http
            .post(self.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Token refresh request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            if is_dead_grant(&body) {
                return Err(ConnectorError::SessionExpired);
            }
            return Err(ConnectorError::Upstream(format!(
                "Token refresh failed: {body}"
            )));
        }

        resp.json::<TokenSet>()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Failed to parse refresh response: {e}")))
    }

    async fn request_tokens_json(
        &self,
        endpoint: &str,
        client_id: &str,
        code: &str,
    ) -> Result<TokenSet, ConnectorError> {
        let mut body = serde_json::json!({
            "grant_type": "authorization_code",
            "code": code,
            "client_id": client_id,
            "redirect_uri": self.redirect_uri,
        });
        if let Some(secret) = &self.client_secret {
            body["client_secret"] = Value::String(secret.clone());
        }

        let resp = self
            .http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ConnectorError::FlowError(format!("Token exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::FlowError(format!(
                "Token exchange failed: {body}"
            )));
        }

        resp.json::<TokenSet>()
            .await
            .map_err(|e| ConnectorError::FlowError(format!("Failed to parse token response: {e}")))
    }

    async fn request_tokens_form(
        &self,
        endpoint: &str,
        client_id: &str,
        code: &str,
    ) -> Result<TokenSet, ConnectorError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client_id),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let resp = self
            .http
            .post(endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::FlowError(format!("Token exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::FlowError(format!(
                "Fallback token exchange failed: {body}"
            )));
        }

        resp.json::<TokenSet>()
            .await
            .map_err(|e| ConnectorError::FlowError(format!("Failed to parse token response: {e}")))
    }

    /// Ask the platform for its advertised authorization URL.
    async fn fetch_authorization_url(&self) -> Result<String, ConnectorError> {
        let endpoint = format!("{}/oauth2/url", self.api_base);
        let resp = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| ConnectorError::FlowError(format!("Authorization URL fetch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ConnectorError::FlowError(format!(
                "Authorization URL fetch returned {}",
                resp.status()
            )));
        }

        let parsed: AuthorizationUrlResponse = resp.json().await.map_err(|e| {
            ConnectorError::FlowError(format!("Invalid authorization URL response: {e}"))
        })?;
        Ok(parsed.url)
    }
}

/// Rewrite an authorization URL into a token URL: a trailing `/auth` segment
/// becomes `/token`, otherwise `/token` is appended after the `oauth2`
/// segment. Returns `None` when neither pattern matches.
pub(crate) fn derive_token_endpoint(authorization_url: &str) -> Option<String> {
    let base = authorization_url
        .split(['?', '#'])
        .next()
        .unwrap_or(authorization_url)
        .trim_end_matches('/');

    if let Some(prefix) = base.strip_suffix("/auth") {
        return Some(format!("{prefix}/token"));
    }
    if let Some(idx) = base.find("/oauth2") {
        let end = idx + "/oauth2".len();
        return Some(format!("{}/token", &base[..end]));
    }
    None
}

/// Refresh rejections that mean the grant itself is gone, not that the
/// request transiently failed.
fn is_dead_grant(body: &str) -> bool {
    ["invalid_grant", "Token is not active", "Refresh token expired"]
        .iter()
        .any(|phrase| body.contains(phrase))
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".into(),
            port: 8320,
            base_url: "http://localhost:8320".into(),
            legion_api_url: "https://api.legion.example".into(),
            legion_client_id: Some("client-123".into()),
            legion_client_secret: None,
            oauth_redirect_uri: "http://localhost:8320/oauth/callback".into(),
            weather_api_key: None,
        }
    }

    #[test]
    fn test_authorization_url_carries_flow_parameters() {
        let oauth = LegionOAuth::new(&test_config());
        let url = oauth.authorization_url("org-1", "feedbeef").unwrap();
        assert!(url.starts_with("https://api.legion.example/oauth2/auth?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("organization_id=org-1"));
        assert!(url.contains("state=feedbeef"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8320%2Foauth%2Fcallback"));
    }

    #[test]
    fn test_authorization_url_requires_client_id() {
        let mut config = test_config();
        config.legion_client_id = None;
        let oauth = LegionOAuth::new(&config);
        assert!(matches!(
            oauth.authorization_url("org-1", "state"),
            Err(ConnectorError::Config(_))
        ));
    }

    #[test]
    fn test_derive_token_endpoint_rewrites_auth_suffix() {
        assert_eq!(
            derive_token_endpoint("https://sso.legion.example/oauth2/auth?audience=x").as_deref(),
            Some("https://sso.legion.example/oauth2/token")
        );
    }

    #[test]
    fn test_derive_token_endpoint_inserts_after_oauth2_segment() {
        assert_eq!(
            derive_token_endpoint("https://sso.legion.example/oauth2/authorize").as_deref(),
            Some("https://sso.legion.example/oauth2/token")
        );
        assert_eq!(
            derive_token_endpoint("https://sso.legion.example/oauth2/").as_deref(),
            Some("https://sso.legion.example/oauth2/token")
        );
    }

    #[test]
    fn test_derive_token_endpoint_unrecognized_shape() {
        assert_eq!(derive_token_endpoint("https://sso.legion.example/login"), None);
    }

    #[test]
    fn test_dead_grant_detection() {
        assert!(is_dead_grant(r#"{"error":"invalid_grant"}"#));
        assert!(is_dead_grant("Token is not active"));
        assert!(is_dead_grant("Refresh token expired for client"));
        assert!(!is_dead_grant(r#"{"error":"server_error"}"#));
    }

    #[test]
    fn test_token_set_defaults_token_type() {
        let tokens: TokenSet =
            serde_json::from_str(r#"{"access_token":"at","expires_in":900}"#).unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, Some(900));
        assert!(tokens.refresh_token.is_none());
    }
}
