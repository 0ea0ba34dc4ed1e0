//! ==============================================================================
//! main.rs - farm grid host entry point
//! ==============================================================================
//!
//! purpose:
//!     serves the irrigation map of the farm: a grid of parcels colored by
//!     "needs water" status, a clickable sensor overlay, and manual
//!     irrigation triggers that are relayed to the external sensor service.
//!
//! responsibilities:
//!     - load configuration (grid size, sensor service url, crops)
//!     - build the in-memory dashboard (synthetic readings until live data)
//!     - fetch live readings once, then optionally on an interval
//!     - serve the web dashboard and click endpoints
//!
//! relationships:
//!     - uses: config.rs (farm.toml), dashboard.rs (view state)
//!     - uses: client.rs (sensor service), sync.rs (fetch/fallback/irrigate)
//!     - uses: server.rs (axum routes), render.rs (html)
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                   rust host (this file)                  │
//!     │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐   │
//!     │  │ poll loop   │   │ web server  │   │ irrigation    │   │
//!     │  │ (optional)  │   │ (port 3000) │   │ tasks (spawn) │   │
//!     │  └──────┬──────┘   └──────┬──────┘   └───────┬───────┘   │
//!     │         └─────────────────┼──────────────────┘           │
//!     │                   ┌───────┴───────┐                      │
//!     │                   │   dashboard   │ <- Arc<RwLock<>>     │
//!     │                   └───────────────┘                      │
//!     └─────────────────────────────┬────────────────────────────┘
//!                                   │ http (reqwest)
//!                       ┌───────────┴───────────┐
//!                       │ sensor service (ext.) │
//!                       │ /sensors  /irrigate   │
//!                       └───────────────────────┘
//!
//! ==============================================================================

mod catalog;
mod client;
mod config;
mod dashboard;
mod domain;
mod grid;
mod overlay;
mod render;
mod server;
mod sync;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use crate::client::HttpSensorService;
use crate::dashboard::Dashboard;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  FarmSmart - Irrigation Grid Host");
    println!("===========================================================");

    // step 1: load configuration
    let config = config::FarmConfig::load_or_default();
    init_tracing(&config.logging.level);
    config.log_summary();

    // step 2: build the dashboard with synthetic readings
    let layout = config.layout();
    let catalog = config.catalog()?;
    let dashboard = Dashboard::new(
        layout,
        catalog,
        config.grid.marker_scale,
        Dashboard::rng_from_seed(config.simulation.seed),
    );
    tracing::info!(
        "[STARTUP] ✓ Grid ready: {} parcels, {} sensor markers",
        dashboard.cells().len(),
        dashboard.markers().len()
    );
    let dashboard = Arc::new(RwLock::new(dashboard));

    // step 3: sensor service client
    let service = Arc::new(
        HttpSensorService::new(&config.backend.base_url, config.backend_timeout())
            .context("failed to build sensor service client")?,
    );
    tracing::info!("[STARTUP] ✓ Sensor service at {}", service.base_url());

    // step 4: start the web server in background
    let state = AppState {
        dashboard: dashboard.clone(),
        service: service.clone(),
        show_sensor_data: config.logging.show_sensor_data,
    };
    let bind = config.server.bind.clone();
    let server = tokio::spawn(async move {
        tracing::info!("[STARTUP] ✓ Dashboard live at http://{}", bind);
        if let Err(e) = server::run_server(state, &bind).await {
            tracing::error!("[ERROR] Web server error: {:#}", e);
        }
    });

    // step 5: initial fetch, then the optional polling loop
    let show_data = config.logging.show_sensor_data;
    let source = sync::refresh(service.as_ref(), &dashboard, show_data).await;
    tracing::info!("[RUNTIME] Data source: {:?}", source);

    if let Some(interval) = config.polling.interval_seconds {
        tracing::info!("[RUNTIME] Starting sensor polling ({}s interval)", interval);
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
            if server.is_finished() {
                break;
            }
            sync::refresh(service.as_ref(), &dashboard, show_data).await;
        }
    } else {
        server.await.context("web server task panicked")?;
    }

    Ok(())
}

/// RUST_LOG wins over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
