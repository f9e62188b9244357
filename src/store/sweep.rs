//! Background sweep for abandoned OAuth states.
//!
//! Runs hourly. An authorization attempt that never reaches the callback
//! leaves its state entry behind; the sweep drops entries older than an hour.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::ConnectorStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const STATE_MAX_AGE: Duration = Duration::from_secs(3600);

/// Start the sweep loop. Spawned once at startup; runs for the process
/// lifetime.
pub async fn state_sweeper(store: Arc<dyn ConnectorStore>) {
    info!("OAuth state sweeper started (interval: 1h)");

    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;
        let removed = store.sweep_states(STATE_MAX_AGE).await;
        if removed > 0 {
            info!("Swept {removed} expired OAuth state(s)");
        } else {
            debug!("OAuth state sweep: nothing to remove");
        }
    }
}
