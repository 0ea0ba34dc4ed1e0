//! ==============================================================================
//! dashboard.rs - in-memory view state of the irrigation map
//! ==============================================================================
//!
//! purpose:
//!     owns the cells, the sensor markers, the crop filter and the detail
//!     panel for the lifetime of the host. every user action lands here as a
//!     method call; methods that affect real hardware return the sensor ids
//!     that must be irrigated, the caller dispatches them (see sync.rs).
//!
//! relationships:
//!     - built from: grid.rs, overlay.rs, catalog.rs
//!     - shared by: server.rs (Arc<RwLock<Dashboard>>)
//!     - fed by: sync.rs (live readings / synthetic fallback)
//!
//! panel state:
//!
//!     Closed ──[select marker]──▶ Open { marker } ──[close]──▶ Closed
//!                                    │    ▲
//!                                    └────┘ [select another marker]
//!
//! ==============================================================================

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::CropCatalog;
use crate::domain::{Cell, Crop, DataSource, LiveReading, SensorMarker, ALL_CROPS};
use crate::grid::{self, GridLayout};
use crate::overlay;

pub const COLOR_THIRSTY: &str = "#FF6B6B";
pub const COLOR_HEALTHY: &str = "#7ED957";
pub const COLOR_FILTERED: &str = "#bdbdbd";
pub const OPACITY_FILTERED: f64 = 0.4;

#[derive(Debug, Error, PartialEq)]
pub enum DashboardError {
    #[error("unknown crop {0:?}")]
    UnknownCrop(String),
    #[error("unknown cell {0:?}")]
    UnknownCell(String),
    #[error("unknown sensor marker {0:?}")]
    UnknownMarker(String),
    #[error("cell {0} is not part of the selected crop")]
    CellInert(String),
    #[error("no sensor is selected")]
    PanelClosed,
}

/// detail panel, only open with a selection
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelState {
    #[default]
    Closed,
    Open { marker_id: String },
}

/// marker joined with its cell and backing reading
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SelectedSensor<'a> {
    pub marker: &'a SensorMarker,
    pub cell: &'a Cell,
    pub crop: Option<&'a Crop>,
    pub reading: Option<&'a LiveReading>,
}

/// result of a cell toggle
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Toggled {
    pub cell_id: String,
    pub needs_water: bool,
    /// live sensor to irrigate, None for simulated cells
    pub sensor_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub thirsty: usize,
    pub healthy: usize,
    /// crop key -> thirsty parcels; "all" counts every thirsty parcel
    pub thirsty_by_crop: BTreeMap<String, usize>,
}

pub struct Dashboard {
    layout: GridLayout,
    catalog: CropCatalog,
    cells: Vec<Cell>,
    markers: Vec<SensorMarker>,
    filter: String,
    panel: PanelState,
    source: DataSource,
    rng: StdRng,
}

impl Dashboard {
    /// lay out the grid and fill it with synthetic readings
    pub fn new(layout: GridLayout, catalog: CropCatalog, marker_scale: f64, mut rng: StdRng) -> Self {
        let cells = grid::build_cells(&layout, &catalog, None, &mut rng);
        let markers = overlay::build_markers(&layout, marker_scale);
        Self {
            layout,
            catalog,
            cells,
            markers,
            filter: ALL_CROPS.to_string(),
            panel: PanelState::Closed,
            source: DataSource::Simulated,
            rng,
        }
    }

    /// seeded generator when `seed` is set, entropy otherwise
    pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
        match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &CropCatalog {
        &self.catalog
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn markers(&self) -> &[SensorMarker] {
        &self.markers
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn panel(&self) -> &PanelState {
        &self.panel
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn cell(&self, id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == id)
    }

    // --------------------------------------------------------------------------
    // data
    // --------------------------------------------------------------------------

    /// merge live readings by cell id, returns how many cells matched
    ///
    /// a reply that matches no cell of the grid (including an empty one) is
    /// "no live data" and falls back to synthetic values.
    pub fn apply_live(&mut self, readings: &[LiveReading]) -> usize {
        let matched = grid::merge_live(&mut self.cells, readings, &mut self.rng);
        if matched == 0 {
            self.fall_back_to_synthetic();
            return 0;
        }
        self.source = DataSource::Live { readings: matched };
        matched
    }

    /// regenerate every cell from the random generator
    pub fn fall_back_to_synthetic(&mut self) {
        grid::reseed_synthetic(&mut self.cells, &mut self.rng);
        self.source = DataSource::Simulated;
    }

    // --------------------------------------------------------------------------
    // filtering
    // --------------------------------------------------------------------------

    pub fn select_crop(&mut self, key: &str) -> Result<(), DashboardError> {
        if !self.catalog.is_known_key(key) {
            return Err(DashboardError::UnknownCrop(key.to_string()));
        }
        self.filter = key.to_string();
        Ok(())
    }

    /// does the current filter let this cell through
    pub fn is_visible(&self, cell: &Cell) -> bool {
        self.filter == ALL_CROPS || cell.crop.as_deref() == Some(self.filter.as_str())
    }

    pub fn cell_color(&self, cell: &Cell) -> &'static str {
        if !self.is_visible(cell) {
            COLOR_FILTERED
        } else if cell.needs_water {
            COLOR_THIRSTY
        } else {
            COLOR_HEALTHY
        }
    }

    pub fn cell_opacity(&self, cell: &Cell) -> f64 {
        if self.is_visible(cell) {
            1.0
        } else {
            OPACITY_FILTERED
        }
    }

    /// full re-scan of the cells
    pub fn stats(&self) -> Stats {
        let thirsty = self.cells.iter().filter(|c| c.needs_water).count();
        let mut by_crop = BTreeMap::new();
        by_crop.insert(ALL_CROPS.to_string(), thirsty);
        for crop in self.catalog.crops() {
            let n = self
                .cells
                .iter()
                .filter(|c| c.needs_water && c.crop.as_deref() == Some(crop.key.as_str()))
                .count();
            by_crop.insert(crop.key.clone(), n);
        }
        Stats {
            total: self.cells.len(),
            thirsty,
            healthy: self.cells.len() - thirsty,
            thirsty_by_crop: by_crop,
        }
    }

    // --------------------------------------------------------------------------
    // irrigation
    // --------------------------------------------------------------------------

    /// flip a cell's needs-water flag
    ///
    /// cells hidden by the filter are inert.
    pub fn toggle_cell(&mut self, id: &str) -> Result<Toggled, DashboardError> {
        let idx = self
            .cells
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| DashboardError::UnknownCell(id.to_string()))?;
        if !self.is_visible(&self.cells[idx]) {
            return Err(DashboardError::CellInert(id.to_string()));
        }
        Ok(self.flip(idx))
    }

    /// toggle without the filter check, shared by grid clicks and the panel
    fn flip(&mut self, idx: usize) -> Toggled {
        let cell = &mut self.cells[idx];
        cell.needs_water = !cell.needs_water;
        Toggled {
            cell_id: cell.id.clone(),
            needs_water: cell.needs_water,
            sensor_id: cell.live_sensor_id().map(str::to_string),
        }
    }

    /// mark every visible thirsty cell as watered
    ///
    /// returns the live sensor ids to irrigate, in cell order.
    pub fn water_all(&mut self) -> Vec<String> {
        let filter = self.filter.clone();
        let mut sensor_ids = Vec::new();
        for cell in self.cells.iter_mut() {
            let visible = filter == ALL_CROPS || cell.crop.as_deref() == Some(filter.as_str());
            if visible && cell.needs_water {
                cell.needs_water = false;
                if let Some(id) = cell.live_sensor_id() {
                    sensor_ids.push(id.to_string());
                }
            }
        }
        sensor_ids
    }

    // --------------------------------------------------------------------------
    // detail panel
    // --------------------------------------------------------------------------

    pub fn select_marker(&mut self, marker_id: &str) -> Result<(), DashboardError> {
        if !self.markers.iter().any(|m| m.id == marker_id) {
            return Err(DashboardError::UnknownMarker(marker_id.to_string()));
        }
        self.panel = PanelState::Open {
            marker_id: marker_id.to_string(),
        };
        Ok(())
    }

    pub fn close_panel(&mut self) {
        self.panel = PanelState::Closed;
    }

    /// compose the open panel's view, None when closed
    pub fn selected(&self) -> Option<SelectedSensor<'_>> {
        let PanelState::Open { marker_id } = &self.panel else {
            return None;
        };
        let marker = self.markers.iter().find(|m| &m.id == marker_id)?;
        let cell = self.cell(&marker.cell_id)?;
        Some(SelectedSensor {
            marker,
            cell,
            crop: cell.crop.as_deref().and_then(|k| self.catalog.get(k)),
            reading: cell.live.as_ref(),
        })
    }

    /// the panel's call-to-action
    ///
    /// the crop filter only makes grid cells inert; the panel acts on the
    /// selected sensor's cell whatever the filter.
    pub fn toggle_selected(&mut self) -> Result<Toggled, DashboardError> {
        let cell_id = self
            .selected()
            .map(|s| s.cell.id.clone())
            .ok_or(DashboardError::PanelClosed)?;
        let idx = self
            .cells
            .iter()
            .position(|c| c.id == cell_id)
            .ok_or(DashboardError::UnknownCell(cell_id))?;
        Ok(self.flip(idx))
    }

    /// serializable copy of the whole view
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            layout: self.layout,
            filter: self.filter.clone(),
            source: self.source,
            panel: self.panel.clone(),
            stats: self.stats(),
            cells: self.cells.clone(),
            markers: self.markers.clone(),
        }
    }
}

/// body of GET /api/state
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub layout: GridLayout,
    pub filter: String,
    pub source: DataSource,
    pub panel: PanelState,
    pub stats: Stats,
    pub cells: Vec<Cell>,
    pub markers: Vec<SensorMarker>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::DEFAULT_MARKER_SCALE;

    fn dashboard(rows: usize, seed: u64) -> Dashboard {
        let layout = GridLayout {
            rows,
            ..GridLayout::default()
        };
        let catalog = CropCatalog::default_for(layout.cell_count());
        Dashboard::new(layout, catalog, DEFAULT_MARKER_SCALE, StdRng::seed_from_u64(seed))
    }

    fn reading(id: &str, cell: &str) -> LiveReading {
        LiveReading {
            id: id.to_string(),
            cell_id: cell.to_string(),
            crop: None,
            needs_water: true,
            temperature: 28.0,
            humidity: 40.0,
            soil_moisture: Some(15.0),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn test_toggle_twice_round_trips() {
        let mut d = dashboard(3, 1);
        let before = d.cell("C7").unwrap().needs_water;
        let first = d.toggle_cell("C7").unwrap();
        assert_eq!(first.needs_water, !before);
        assert_eq!(first.sensor_id, None);
        d.toggle_cell("C7").unwrap();
        assert_eq!(d.cell("C7").unwrap().needs_water, before);
    }

    #[test]
    fn test_toggle_unknown_cell() {
        let mut d = dashboard(3, 1);
        assert_eq!(
            d.toggle_cell("C99"),
            Err(DashboardError::UnknownCell("C99".to_string()))
        );
    }

    #[test]
    fn test_filter_keeps_cells_and_makes_others_inert() {
        let mut d = dashboard(3, 2);
        d.select_crop("onion").unwrap();
        assert_eq!(d.cells().len(), 24);
        let c1 = d.cell("C1").unwrap().clone();
        assert_eq!(d.cell_color(&c1), COLOR_FILTERED);
        assert_eq!(d.cell_opacity(&c1), OPACITY_FILTERED);
        assert_eq!(d.toggle_cell("C1"), Err(DashboardError::CellInert("C1".to_string())));
        assert_eq!(d.cell("C1").unwrap().needs_water, c1.needs_water);
        let c9 = d.cell("C9").unwrap().clone();
        assert_eq!(d.cell_opacity(&c9), 1.0);
        assert!(d.toggle_cell("C9").is_ok());
    }

    #[test]
    fn test_unknown_crop_keeps_filter() {
        let mut d = dashboard(3, 2);
        d.select_crop("mint").unwrap();
        assert!(d.select_crop("corn").is_err());
        assert_eq!(d.filter(), "mint");
    }

    #[test]
    fn test_cell_colors() {
        let mut d = dashboard(3, 3);
        d.apply_live(&[reading("S1", "C2")]);
        let c2 = d.cell("C2").unwrap().clone();
        assert_eq!(d.cell_color(&c2), COLOR_THIRSTY);
        d.toggle_cell("C2").unwrap();
        let c2 = d.cell("C2").unwrap().clone();
        assert_eq!(d.cell_color(&c2), COLOR_HEALTHY);
    }

    #[test]
    fn test_stats_by_crop() {
        let mut d = dashboard(3, 4);
        d.apply_live(
            &(1..=24)
                .map(|n| {
                    let mut r = reading(&format!("S{}", n), &format!("C{}", n));
                    r.needs_water = n % 2 == 0;
                    r
                })
                .collect::<Vec<_>>(),
        );
        let stats = d.stats();
        assert_eq!(stats.total, 24);
        assert_eq!(stats.thirsty, 12);
        assert_eq!(stats.healthy, 12);
        assert_eq!(stats.thirsty_by_crop["all"], 12);
        assert_eq!(stats.thirsty_by_crop["tomato"], 4);
        assert_eq!(stats.thirsty_by_crop["onion"], 3);
        assert_eq!(stats.thirsty_by_crop["mint"], 5);
    }

    #[test]
    fn test_live_example_single_reading() {
        let mut d = dashboard(3, 5);
        let before = d.cells().to_vec();
        let matched = d.apply_live(&[reading("S1", "C5")]);
        assert_eq!(matched, 1);
        assert_eq!(d.source(), DataSource::Live { readings: 1 });
        let c5 = d.cell("C5").unwrap();
        assert!(c5.needs_water);
        assert_eq!((c5.temperature, c5.humidity, c5.soil_moisture), (28.0, 40.0, Some(15.0)));
        for (a, b) in before.iter().zip(d.cells()) {
            if a.id != "C5" {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_empty_live_falls_back() {
        let mut d = dashboard(3, 6);
        d.apply_live(&[reading("S1", "C5")]);
        assert_eq!(d.apply_live(&[]), 0);
        assert_eq!(d.source(), DataSource::Simulated);
        assert!(d.cells().iter().all(|c| !c.is_live()));
    }

    #[test]
    fn test_successive_live_replies_replace_each_other() {
        let mut d = dashboard(3, 12);
        let c7_before = d.cell("C7").unwrap().clone();
        d.apply_live(&[reading("S5", "C5")]);
        assert_eq!(d.apply_live(&[reading("S6", "C6")]), 1);
        assert_eq!(d.source(), DataSource::Live { readings: 1 });

        let c5 = d.cell("C5").unwrap();
        assert!(!c5.is_live());
        assert_eq!(c5.soil_moisture, None);
        assert_eq!(d.cell("C6").unwrap().live_sensor_id(), Some("S6"));
        assert_eq!(d.cell("C7").unwrap(), &c7_before);
        assert_eq!(d.cells().iter().filter(|c| c.is_live()).count(), 1);

        // a stale sensor must not be irrigated
        let t = d.toggle_cell("C5").unwrap();
        assert_eq!(t.sensor_id, None);
    }

    #[test]
    fn test_reply_matching_no_cell_is_simulated() {
        let mut d = dashboard(3, 13);
        d.apply_live(&[reading("S1", "C1")]);
        assert_eq!(d.apply_live(&[reading("S9", "C99")]), 0);
        assert_eq!(d.source(), DataSource::Simulated);
        assert!(!d.source().is_live());
        assert!(d.cells().iter().all(|c| !c.is_live()));
    }

    #[test]
    fn test_toggle_live_cell_returns_sensor() {
        let mut d = dashboard(3, 7);
        d.apply_live(&[reading("Sensor05", "C5")]);
        let t = d.toggle_cell("C5").unwrap();
        assert!(!t.needs_water);
        assert_eq!(t.sensor_id.as_deref(), Some("Sensor05"));
    }

    #[test]
    fn test_water_all_respects_filter() {
        let mut d = dashboard(3, 8);
        d.apply_live(&[reading("S3", "C3"), reading("S10", "C10")]);
        d.select_crop("tomato").unwrap();
        let ids = d.water_all();
        assert_eq!(ids, vec!["S3".to_string()]);
        assert!(d.cells().iter().filter(|c| c.row == 0).all(|c| !c.needs_water));
        assert!(d.cell("C10").unwrap().needs_water);

        d.select_crop("all").unwrap();
        let ids = d.water_all();
        assert_eq!(ids, vec!["S10".to_string()]);
        assert_eq!(d.stats().thirsty, 0);
    }

    #[test]
    fn test_panel_states() {
        let mut d = dashboard(3, 9);
        assert_eq!(d.panel(), &PanelState::Closed);
        assert!(d.selected().is_none());
        assert_eq!(d.toggle_selected(), Err(DashboardError::PanelClosed));
        assert!(d.select_marker("S9-9").is_err());
        assert_eq!(d.panel(), &PanelState::Closed);

        d.select_marker("S3-8").unwrap();
        let sel = d.selected().unwrap();
        assert_eq!(sel.marker.id, "S3-8");
        assert_eq!(sel.cell.id, "C24");
        assert_eq!(sel.crop.unwrap().key, "mint");
        assert!(sel.reading.is_none());

        d.select_marker("S0-0").unwrap();
        assert_eq!(d.selected().unwrap().cell.id, "C1");

        d.close_panel();
        assert!(d.selected().is_none());
    }

    #[test]
    fn test_panel_toggle_follows_cell_path() {
        let mut d = dashboard(3, 10);
        d.apply_live(&[reading("S1", "C1")]);
        d.select_marker("S0-0").unwrap();
        let t = d.toggle_selected().unwrap();
        assert_eq!(t.cell_id, "C1");
        assert_eq!(t.sensor_id.as_deref(), Some("S1"));
        assert!(!d.selected().unwrap().cell.needs_water);

        // the filter makes C1 inert on the grid, the panel still acts on it
        d.select_crop("mint").unwrap();
        assert_eq!(d.toggle_cell("C1"), Err(DashboardError::CellInert("C1".to_string())));
        let t = d.toggle_selected().unwrap();
        assert_eq!(t.cell_id, "C1");
        assert!(t.needs_water);
        assert_eq!(t.sensor_id.as_deref(), Some("S1"));
        assert!(d.cell("C1").unwrap().needs_water);
    }

    #[test]
    fn test_markers_survive_data_updates() {
        let mut d = dashboard(4, 11);
        let markers = d.markers().to_vec();
        d.apply_live(&[reading("S1", "C1")]);
        d.fall_back_to_synthetic();
        assert_eq!(d.markers(), markers.as_slice());
        assert_eq!(markers.len(), 5 * 9);
    }
}
