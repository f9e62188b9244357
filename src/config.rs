use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    /// Public base URL of this service, used to default the redirect URI.
    pub base_url: String,

    // ── Legion platform ─────────────────────────────────────────────────
    pub legion_api_url: String,
    /// OAuth client credentials provisioned on the platform. Absent
    /// credentials surface as a configuration error on the request that
    /// needs them, not at startup.
    pub legion_client_id: Option<String>,
    pub legion_client_secret: Option<String>,
    /// Callback URL registered with the platform.
    pub oauth_redirect_uri: String,

    // ── Weather API ─────────────────────────────────────────────────────
    pub weather_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8320".into());

        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8320".into())
                .parse()
                .context("Invalid PORT")?,

            legion_api_url: std::env::var("LEGION_API_URL")
                .context("LEGION_API_URL is required (Legion platform API base URL)")?,
            legion_client_id: std::env::var("LEGION_CLIENT_ID").ok(),
            legion_client_secret: std::env::var("LEGION_CLIENT_SECRET").ok(),
            oauth_redirect_uri: std::env::var("OAUTH_REDIRECT_URI")
                .unwrap_or_else(|_| format!("{base_url}/oauth/callback")),

            weather_api_key: std::env::var("OPENWEATHER_API_KEY").ok(),

            base_url,
        })
    }
}
