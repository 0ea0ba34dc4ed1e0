//! ==============================================================================
//! overlay.rs - sensor marker lattice
//! ==============================================================================
//!
//! purpose:
//!     places a clickable triangle at every grid-line intersection
//!     ((rows + 1) x (cols + 1) markers). each marker remembers the nearest
//!     enclosing cell so a click can be resolved to parcel data.
//!
//!     markers are computed once when the grid is laid out and are not
//!     touched by data refreshes.
//!
//! ==============================================================================

use crate::domain::SensorMarker;
use crate::grid::GridLayout;

/// marker size relative to the smaller cell dimension
pub const DEFAULT_MARKER_SCALE: f64 = 0.15;

pub fn build_markers(layout: &GridLayout, scale: f64) -> Vec<SensorMarker> {
    let size = layout.cell_width().min(layout.cell_height()) * scale;
    let mut markers = Vec::with_capacity((layout.rows + 1) * (layout.cols + 1));
    for row in 0..=layout.rows {
        for col in 0..=layout.cols {
            let (x, y) = layout.point(row, col);
            // bottom and right edges belong to the last row/column
            let cell_id = layout.cell_id(row.min(layout.rows - 1), col.min(layout.cols - 1));
            markers.push(SensorMarker {
                id: format!("S{}-{}", row, col),
                row,
                col,
                x,
                y,
                size,
                points: triangle(x, y, size),
                cell_id,
            });
        }
    }
    markers
}

/// upward triangle centered on (x, y)
fn triangle(x: f64, y: f64, s: f64) -> String {
    format!(
        "{},{} {},{} {},{}",
        x,
        y - s,
        x - s,
        y + s,
        x + s,
        y + s
    )
}
