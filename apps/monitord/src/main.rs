//! Headless monitoring daemon: polls the pond sensors on the configured
//! cadence and maintains the alert feed until interrupted.

use aquamon_cloudstore::CloudStore;
use aquamon_core::{default_sensors, AlertEngine, FilePreferences};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_STORE_URL: &str = "http://localhost:8089";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let store_url =
        std::env::var("AQUAMON_STORE_URL").unwrap_or_else(|_| DEFAULT_STORE_URL.to_string());
    info!("Using alert store at {}", store_url);

    let prefs = match FilePreferences::load() {
        Ok(prefs) => prefs,
        Err(e) => {
            warn!("Failed to load preferences, using defaults: {}", e);
            FilePreferences::default()
        }
    };

    let cloud = CloudStore::new(store_url);
    let engine = Arc::new(AlertEngine::new(
        default_sensors(),
        cloud.clone(),
        cloud,
        prefs,
    ));

    let scheduler = engine.start();
    info!("Monitoring started, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    scheduler.stop().await;
}
