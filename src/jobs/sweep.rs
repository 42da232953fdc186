//! Background job: garbage-collect expired capability tokens.
//!
//! Expiry enforcement never depends on this job — an expired token fails
//! validation whether or not the row still exists. The sweep only reclaims
//! storage, so it can run at a relaxed interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use crate::store::TokenStore;

/// Spawn the background sweep task. Call this once at startup.
pub fn spawn(store: Arc<dyn TokenStore>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            match store.delete_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(removed, "swept expired capability tokens");
                }
                Err(e) => {
                    tracing::error!("token sweep failed: {}", e);
                }
            }
        }
    });
}
