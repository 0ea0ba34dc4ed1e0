//! ==============================================================================
//! grid.rs - grid builder
//! ==============================================================================
//!
//! purpose:
//!     computes per-cell pixel geometry by dividing the drawable area of the
//!     canvas evenly, assigns crops from the catalog, and fills readings
//!     either from live sensor data or from an injected random generator.
//!
//! relationships:
//!     - used by: dashboard.rs (initial grid, fallback, live merge)
//!     - uses: catalog.rs (crop membership)
//!
//! synthetic readings:
//!     temperature  20..35 (integer celsius)
//!     humidity     30..80 (integer percent)
//!     needs water  40% of parcels
//!
//! ==============================================================================

use std::collections::HashMap;
use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CropCatalog;
use crate::domain::{Cell, CellGeometry, LiveReading};

pub const SYNTHETIC_TEMPERATURE: Range<u32> = 20..35;
pub const SYNTHETIC_HUMIDITY: Range<u32> = 30..80;
pub const SYNTHETIC_THIRST_PROBABILITY: f64 = 0.4;

/// grid dimensions and canvas it is drawn into
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
    pub padding: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 8,
            padding: 10.0,
            canvas_width: 960.0,
            canvas_height: 480.0,
        }
    }
}

impl GridLayout {
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn cell_width(&self) -> f64 {
        (self.canvas_width - self.padding * 2.0) / self.cols as f64
    }

    pub fn cell_height(&self) -> f64 {
        (self.canvas_height - self.padding * 2.0) / self.rows as f64
    }

    /// top-left corner of grid-line intersection (row, col)
    pub fn point(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.padding + col as f64 * self.cell_width(),
            self.padding + row as f64 * self.cell_height(),
        )
    }

    pub fn geometry(&self, row: usize, col: usize) -> CellGeometry {
        let (x, y) = self.point(row, col);
        let width = self.cell_width();
        let height = self.cell_height();
        CellGeometry {
            x,
            y,
            cx: x + width / 2.0,
            cy: y + height / 2.0,
            width,
            height,
        }
    }

    /// 1-based, row-major cell id
    pub fn cell_id(&self, row: usize, col: usize) -> String {
        format!("C{}", row * self.cols + col + 1)
    }

    /// reject layouts that cannot be drawn
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(LayoutError::Empty {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.padding.is_nan() || self.padding < 0.0 {
            return Err(LayoutError::NegativePadding(self.padding));
        }
        let drawable_w = self.canvas_width - self.padding * 2.0;
        let drawable_h = self.canvas_height - self.padding * 2.0;
        if !(drawable_w.is_finite() && drawable_w > 0.0 && drawable_h.is_finite() && drawable_h > 0.0) {
            return Err(LayoutError::NoDrawableArea {
                padding: self.padding,
                width: self.canvas_width,
                height: self.canvas_height,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("grid must have at least one row and column (got {cols}x{rows})")]
    Empty { rows: usize, cols: usize },
    #[error("padding must not be negative (got {0})")]
    NegativePadding(f64),
    #[error("padding {padding} leaves no drawable area in a {width}x{height} canvas")]
    NoDrawableArea { padding: f64, width: f64, height: f64 },
}

/// temperature, humidity and thirst for one parcel
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticReading {
    pub needs_water: bool,
    pub temperature: f32,
    pub humidity: f32,
}

impl SyntheticReading {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            needs_water: rng.gen_bool(SYNTHETIC_THIRST_PROBABILITY),
            temperature: rng.gen_range(SYNTHETIC_TEMPERATURE) as f32,
            humidity: rng.gen_range(SYNTHETIC_HUMIDITY) as f32,
        }
    }
}

/// build every cell of the grid
///
/// cells whose id appears in `live` take that reading, the rest are synthetic.
pub fn build_cells<R: Rng + ?Sized>(
    layout: &GridLayout,
    catalog: &CropCatalog,
    live: Option<&HashMap<String, LiveReading>>,
    rng: &mut R,
) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(layout.cell_count());
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let id = layout.cell_id(row, col);
            let crop = catalog.crop_for(&id).map(|c| c.key.clone());
            let synthetic = SyntheticReading::generate(rng);
            let mut cell = Cell {
                id,
                row,
                col,
                geometry: layout.geometry(row, col),
                crop,
                needs_water: synthetic.needs_water,
                temperature: synthetic.temperature,
                humidity: synthetic.humidity,
                soil_moisture: None,
                live: None,
            };
            if let Some(reading) = live.and_then(|m| m.get(&cell.id)) {
                apply_reading(&mut cell, reading);
            }
            cells.push(cell);
        }
    }
    cells
}

/// overwrite a cell's readings with a live one
pub fn apply_reading(cell: &mut Cell, reading: &LiveReading) {
    cell.needs_water = reading.needs_water;
    cell.temperature = reading.temperature;
    cell.humidity = reading.humidity;
    cell.soil_moisture = reading.soil_moisture;
    cell.live = Some(reading.clone());
}

/// regenerate synthetic readings in place and drop live references
pub fn reseed_synthetic<R: Rng + ?Sized>(cells: &mut [Cell], rng: &mut R) {
    for cell in cells.iter_mut() {
        let s = SyntheticReading::generate(rng);
        cell.needs_water = s.needs_water;
        cell.temperature = s.temperature;
        cell.humidity = s.humidity;
        cell.soil_moisture = None;
        cell.live = None;
    }
}

/// merge readings into existing cells by cell id
///
/// returns the number of cells that matched. readings naming a cell that is
/// not part of the grid are skipped. cells that were live but are missing
/// from this reply go back to synthetic values; cells that never were live
/// keep their current state.
pub fn merge_live<R: Rng + ?Sized>(cells: &mut [Cell], readings: &[LiveReading], rng: &mut R) -> usize {
    let by_cell: HashMap<&str, &LiveReading> =
        readings.iter().map(|r| (r.cell_id.as_str(), r)).collect();
    let mut matched = 0;
    for cell in cells.iter_mut() {
        if let Some(reading) = by_cell.get(cell.id.as_str()) {
            apply_reading(cell, reading);
            matched += 1;
        } else if cell.is_live() {
            reseed_synthetic(std::slice::from_mut(cell), rng);
        }
    }
    for reading in readings {
        if !cells.iter().any(|c| c.id == reading.cell_id) {
            tracing::debug!(
                "[GRID] reading {} targets unknown cell {}",
                reading.id,
                reading.cell_id
            );
        }
    }
    matched
}
