//! The background expiry sweep (§4.2): a long-lived `tokio` task, spawned
//! once at startup, holding a shared `Arc<dyn KeyStore>` handle — the same
//! "long-lived task owning a shared `Arc`" shape used elsewhere in this
//! codebase for background work tied to the server's lifetime.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::KeyStore;

/// Spawns the periodic sweep task. Never returns; intended to be
/// `tokio::spawn`ed once from `main` and left running for the process
/// lifetime.
pub async fn run(store: Arc<dyn KeyStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so the sweep only runs on
    // the configured cadence.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let now_millis = now_millis();
        let removed = store.sweep_expired(now_millis).await;
        info!(removed, "expiry sweep completed");
    }
}

fn now_millis() -> i64 {
    i64::try_from(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or(i64::MAX)
}
