//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! purpose:
//!     serves the rendered map and turns every click into a state change.
//!
//! routes:
//!     GET  /                          rendered dashboard (render.rs)
//!     GET  /api/state                 json snapshot
//!     POST /api/filter/:crop          select crop filter
//!     POST /api/cells/:id/toggle      toggle needs-water (+ irrigate if live)
//!     POST /api/markers/:id/select    open the sensor panel
//!     POST /api/panel/close           close the sensor panel
//!     POST /api/panel/toggle          toggle the selected sensor's cell
//!     POST /api/water-all             water every visible thirsty cell
//!     POST /api/refresh               re-fetch live readings
//!
//! relationships:
//!     - shares: dashboard.rs state via Arc<RwLock<>>
//!     - uses: sync.rs (refresh, irrigation dispatch)
//!
//! ==============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::client::SensorService;
use crate::dashboard::{DashboardError, Snapshot, Toggled};
use crate::render;
use crate::sync::{self, SharedDashboard};

/// handles shared by every request
pub struct AppState<S> {
    pub dashboard: SharedDashboard,
    pub service: Arc<S>,
    pub show_sensor_data: bool,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            dashboard: self.dashboard.clone(),
            service: self.service.clone(),
            show_sensor_data: self.show_sensor_data,
        }
    }
}

pub fn router<S: SensorService>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(dashboard_handler::<S>))
        .route("/api/state", get(state_handler::<S>))
        .route("/api/filter/:crop", post(filter_handler::<S>))
        .route("/api/cells/:id/toggle", post(toggle_handler::<S>))
        .route("/api/markers/:id/select", post(select_handler::<S>))
        .route("/api/panel/close", post(close_handler::<S>))
        .route("/api/panel/toggle", post(panel_toggle_handler::<S>))
        .route("/api/water-all", post(water_all_handler::<S>))
        .route("/api/refresh", post(refresh_handler::<S>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server<S: SensorService>(state: AppState<S>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// dashboard error as an http response
pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            DashboardError::UnknownCrop(_)
            | DashboardError::UnknownCell(_)
            | DashboardError::UnknownMarker(_) => StatusCode::NOT_FOUND,
            DashboardError::CellInert(_) | DashboardError::PanelClosed => StatusCode::CONFLICT,
        };
        let body = json!({"status": "error", "message": self.0.to_string()});
        (status, Json(body)).into_response()
    }
}

async fn dashboard_handler<S: SensorService>(State(state): State<AppState<S>>) -> Html<String> {
    let dash = state.dashboard.read().await;
    Html(render::render_page(&dash))
}

async fn state_handler<S: SensorService>(State(state): State<AppState<S>>) -> Json<Snapshot> {
    Json(state.dashboard.read().await.snapshot())
}

async fn filter_handler<S: SensorService>(
    State(state): State<AppState<S>>,
    Path(crop): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.dashboard.write().await.select_crop(&crop)?;
    Ok(Json(json!({"status": "ok", "filter": crop})))
}

async fn toggle_handler<S: SensorService>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Toggled>, ApiError> {
    let toggled = state.dashboard.write().await.toggle_cell(&id)?;
    irrigate_toggled(&state, &toggled);
    Ok(Json(toggled))
}

async fn select_handler<S: SensorService>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut dash = state.dashboard.write().await;
    dash.select_marker(&id)?;
    tracing::debug!("[PANEL] sensor {} selected", id);
    Ok(Json(json!({"status": "ok", "panel": dash.panel()})))
}

async fn close_handler<S: SensorService>(State(state): State<AppState<S>>) -> Json<serde_json::Value> {
    state.dashboard.write().await.close_panel();
    Json(json!({"status": "ok", "panel": {"state": "closed"}}))
}

async fn panel_toggle_handler<S: SensorService>(
    State(state): State<AppState<S>>,
) -> Result<Json<Toggled>, ApiError> {
    let toggled = state.dashboard.write().await.toggle_selected()?;
    irrigate_toggled(&state, &toggled);
    Ok(Json(toggled))
}

async fn water_all_handler<S: SensorService>(State(state): State<AppState<S>>) -> Json<serde_json::Value> {
    let sensor_ids = state.dashboard.write().await.water_all();
    tracing::info!("[IRRIGATE] water all: {} live sensors", sensor_ids.len());
    let response = json!({"status": "ok", "irrigating": sensor_ids});
    sync::dispatch_irrigation(state.service.clone(), sensor_ids);
    Json(response)
}

async fn refresh_handler<S: SensorService>(State(state): State<AppState<S>>) -> Json<serde_json::Value> {
    let source = sync::refresh(state.service.as_ref(), &state.dashboard, state.show_sensor_data).await;
    Json(json!({"status": "ok", "source": source}))
}

/// fire-and-forget irrigation for a live-backed toggle
fn irrigate_toggled<S: SensorService>(state: &AppState<S>, toggled: &Toggled) {
    if let Some(sensor_id) = &toggled.sensor_id {
        sync::dispatch_irrigation(state.service.clone(), vec![sensor_id.clone()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CropCatalog;
    use crate::dashboard::Dashboard;
    use crate::grid::GridLayout;
    use crate::overlay::DEFAULT_MARKER_SCALE;
    use crate::sync::fake::{reading, FakeSensorService};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::RwLock;

    fn app_state(service: FakeSensorService) -> AppState<FakeSensorService> {
        let layout = GridLayout::default();
        AppState {
            dashboard: Arc::new(RwLock::new(Dashboard::new(
                layout,
                CropCatalog::default_for(layout.cell_count()),
                DEFAULT_MARKER_SCALE,
                StdRng::seed_from_u64(1),
            ))),
            service: Arc::new(service),
            show_sensor_data: false,
        }
    }

    #[tokio::test]
    async fn test_toggle_live_cell_irrigates() {
        let state = app_state(FakeSensorService::with_readings(vec![reading("Sensor05", "C5")]));
        sync::refresh(state.service.as_ref(), &state.dashboard, false).await;

        let Json(t) = toggle_handler(State(state.clone()), Path("C5".to_string()))
            .await
            .ok()
            .unwrap();
        assert!(!t.needs_water);
        // let the spawned command run
        for _ in 0..10 {
            if !state.service.irrigated().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state.service.irrigated(), vec!["Sensor05".to_string()]);
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let state = app_state(FakeSensorService::default());
        let resp = toggle_handler(State(state.clone()), Path("C99".to_string()))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let Json(body) = filter_handler(State(state.clone()), Path("mint".to_string()))
            .await
            .ok()
            .unwrap();
        assert_eq!(body["filter"], "mint");
        let resp = toggle_handler(State(state.clone()), Path("C1".to_string()))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = panel_toggle_handler(State(state.clone()))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = filter_handler(State(state), Path("corn".to_string()))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_panel_round_trip() {
        let state = app_state(FakeSensorService::default());
        let Json(body) = select_handler(State(state.clone()), Path("S2-3".to_string()))
            .await
            .ok()
            .unwrap();
        assert_eq!(body["status"], "ok");
        let Json(t) = panel_toggle_handler(State(state.clone())).await.ok().unwrap();
        assert_eq!(t.cell_id, "C20");
        assert_eq!(t.sensor_id, None);
        let Json(body) = close_handler(State(state.clone())).await;
        assert_eq!(body["panel"]["state"], "closed");
        assert!(state.dashboard.read().await.selected().is_none());
    }

    #[tokio::test]
    async fn test_water_all_and_state_snapshot() {
        let state = app_state(FakeSensorService::with_readings(vec![reading("S1", "C1")]));
        let Json(body) = refresh_handler(State(state.clone())).await;
        assert_eq!(body["source"]["kind"], "live");
        assert_eq!(body["source"]["readings"], 1);
        let Json(body) = water_all_handler(State(state.clone())).await;
        assert_eq!(body["irrigating"], serde_json::json!(["S1"]));
        let Json(snap) = state_handler(State(state.clone())).await;
        assert_eq!(snap.stats.thirsty, 0);
        assert_eq!(snap.cells.len(), 24);
        assert_eq!(snap.markers.len(), 36);
        for _ in 0..10 {
            if !state.service.irrigated().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state.service.irrigated(), vec!["S1".to_string()]);
    }

    #[tokio::test]
    async fn test_dashboard_page_renders() {
        let state = app_state(FakeSensorService::default());
        let Html(page) = dashboard_handler(State(state)).await;
        assert!(page.starts_with("<!doctype html>"));
    }
}
