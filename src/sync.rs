//! ==============================================================================
//! sync.rs - live data integration
//! ==============================================================================
//!
//! purpose:
//!     glue between the dashboard state and the external sensor service.
//!
//! fetch:
//!     readings replace the synthetic baseline by cell id. any failure
//!     (transport, http status, success:false, bad body, empty list) silently
//!     regenerates synthetic data. no retry, no backoff.
//!
//! irrigate:
//!     the dashboard has already flipped its local state (optimistic). the
//!     command runs on a spawned task; failures are only logged, there is no
//!     rollback and no de-duplication.
//!
//! locking:
//!     the dashboard lock is never held across a network call.
//!
//! ==============================================================================

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::client::SensorService;
use crate::dashboard::Dashboard;
use crate::domain::DataSource;

pub type SharedDashboard = Arc<RwLock<Dashboard>>;

/// fetch live readings and merge them, or fall back to synthetic data
pub async fn refresh<S: SensorService>(
    service: &S,
    dashboard: &SharedDashboard,
    show_data: bool,
) -> DataSource {
    let fetched = service.fetch_sensors().await;
    let mut guard = dashboard.write().await;
    match fetched {
        Ok(readings) if !readings.is_empty() => {
            if show_data {
                for r in &readings {
                    tracing::info!(
                        "[SENSORS] {} -> {} | Temp: {:.1}°C | Humidity: {:.1}% | Thirsty: {}",
                        r.id,
                        r.cell_id,
                        r.temperature,
                        r.humidity,
                        r.needs_water
                    );
                }
            }
            let matched = guard.apply_live(&readings);
            tracing::info!(
                "[SENSORS] ✓ {} live readings, {} matched grid cells",
                readings.len(),
                matched
            );
        }
        Ok(_) => {
            tracing::warn!("[SENSORS] ⚠ service returned no readings - using simulated data");
            guard.fall_back_to_synthetic();
        }
        Err(e) => {
            tracing::warn!("[SENSORS] ⚠ {} - using simulated data", e);
            guard.fall_back_to_synthetic();
        }
    }
    guard.source()
}

/// send irrigation commands in the background, one after another
///
/// returns None when there is nothing to send.
pub fn dispatch_irrigation<S: SensorService>(
    service: Arc<S>,
    sensor_ids: Vec<String>,
) -> Option<JoinHandle<()>> {
    if sensor_ids.is_empty() {
        return None;
    }
    Some(tokio::spawn(async move {
        for id in sensor_ids {
            match service.irrigate(&id).await {
                Ok(reply) => tracing::info!("[IRRIGATE] ✓ {}: {}", id, reply.message),
                Err(e) => tracing::error!("[IRRIGATE] {} failed: {}", id, e),
            }
        }
    }))
}
