//! ==============================================================================
//! domain.rs - records shared by the grid, the dashboard and the sensor service
//! ==============================================================================
//!
//! purpose:
//!     explicit records for crops, cells, sensor markers and the live readings
//!     that arrive from the external sensor service.
//!
//! relationships:
//!     - built by: grid.rs (cells), overlay.rs (markers), catalog.rs (crops)
//!     - decoded by: client.rs (LiveReading, SensorsResponse, IrrigateResponse)
//!     - owned by: dashboard.rs
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};

/// key of the pseudo-crop that aggregates every parcel
pub const ALL_CROPS: &str = "all";

/// one entry of the crop catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    /// stable key (e.g., "tomato")
    pub key: String,
    /// display name
    pub name: String,
    /// css color used for the sidebar accent and crop tag
    pub color: String,
    pub icon: String,
    /// parcel ids covered by this crop (e.g., ["C1", "C2"])
    pub parcels: Vec<String>,
}

/// pixel geometry of a cell inside the canvas
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CellGeometry {
    pub x: f64,
    pub y: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: f64,
    pub height: f64,
}

/// one irrigation parcel
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cell {
    /// "C1".."C{rows*cols}", row-major
    pub id: String,
    pub row: usize,
    pub col: usize,
    pub geometry: CellGeometry,
    /// crop key, None when no crop claims the parcel
    pub crop: Option<String>,
    pub needs_water: bool,
    /// temperature in celsius
    pub temperature: f32,
    /// relative humidity (0-100%)
    pub humidity: f32,
    /// soil moisture (%), only known for live cells
    pub soil_moisture: Option<f32>,
    /// backing reading when the cell is fed by the sensor service
    pub live: Option<LiveReading>,
}

impl Cell {
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// sensor id to irrigate, if the cell is backed by a live reading
    pub fn live_sensor_id(&self) -> Option<&str> {
        self.live.as_ref().map(|r| r.id.as_str())
    }
}

/// clickable triangle at a grid-line intersection
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorMarker {
    /// "S<row>-<col>"
    pub id: String,
    pub row: usize,
    pub col: usize,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    /// svg polygon points
    pub points: String,
    /// nearest enclosing cell, used to resolve details on click
    pub cell_id: String,
}

/// a reading reported by the external sensor service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    /// sensor identifier (e.g., "Sensor05"), used for irrigation commands
    pub id: String,
    #[serde(rename = "cellId")]
    pub cell_id: String,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(rename = "needsWater")]
    pub needs_water: bool,
    pub temperature: f32,
    pub humidity: f32,
    #[serde(default)]
    pub soil_moisture: Option<f32>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// body of GET /sensors
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensorsResponse {
    pub success: bool,
    #[serde(default)]
    pub sensors: Vec<LiveReading>,
}

/// body of POST /irrigate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrrigateRequest {
    pub sensor_id: String,
}

/// reply of POST /irrigate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrrigateResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// where the current cell values came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Simulated,
    Live { readings: usize },
}

impl DataSource {
    pub fn is_live(&self) -> bool {
        matches!(self, DataSource::Live { .. })
    }
}
