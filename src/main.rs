use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use legion_weather_connector::{
    api, platform, store, store::ConnectorStore, weather, AppState, Config, SharedState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legion_weather_connector=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("legion-weather-connector v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);
    info!("Legion API: {}", config.legion_api_url);

    if config.legion_client_id.is_none() {
        warn!("LEGION_CLIENT_ID not set — /connect will fail until credentials are provisioned");
    }
    if config.weather_api_key.is_none() {
        warn!("OPENWEATHER_API_KEY not set — weather endpoints will fail");
    }

    // Everything lives in memory; a restart drops all sessions and caches.
    let connector_store: Arc<dyn ConnectorStore> = Arc::new(store::MemoryStore::new());

    let state: SharedState = Arc::new(AppState {
        oauth: platform::LegionOAuth::new(&config),
        platform: platform::LegionApi::new(&config),
        weather: weather::WeatherClient::new(config.weather_api_key.clone()),
        store: connector_store.clone(),
        config,
    });

    // Start the hourly sweep for abandoned OAuth states
    tokio::spawn(store::state_sweeper(connector_store.clone()));

    // Build router
    let app = api::router(state.clone());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connector_store.clear_all().await;
    info!("In-memory state cleared, exiting");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
