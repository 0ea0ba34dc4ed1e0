//! ==============================================================================
//! render.rs - html/svg rendering of the irrigation map
//! ==============================================================================
//!
//! purpose:
//!     turns a Dashboard into a complete html page: crop sidebar, global
//!     status, svg canvas with cells and sensor markers, legend, and the
//!     sensor detail panel when one is selected.
//!
//!     clicks are sent back as POSTs by a tiny inline script which then
//!     reloads the page. the host stays the single owner of the state.
//!
//! relationships:
//!     - used by: server.rs (GET /)
//!     - reads: dashboard.rs (colors, opacity, stats, selection)
//!
//! ==============================================================================

use std::fmt::Write;

use crate::catalog::CropCatalog;
use crate::dashboard::{Dashboard, SelectedSensor};
use crate::domain::{Cell, SensorMarker, ALL_CROPS};

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #f1f8e9; color: #1b2e0b; }
.app { display: flex; min-height: 100vh; }
.sidebar { width: 280px; background: #2d5016; color: #fff; padding: 1rem; }
.sidebar h1 { margin: 0; }
.plant-item { border-left: 6px solid; padding: .5rem; margin: .5rem 0; background: rgba(255,255,255,.08); cursor: pointer; }
.plant-item.active { background: rgba(255,255,255,.25); }
.plant-item h3 { margin: 0; font-size: 1rem; }
.plant-item p { margin: .2rem 0; font-size: .8rem; }
.water-indicator.soif { color: #ffcdd2; }
.water-indicator.ok { color: #c8e6c9; }
.action-btn { display: block; width: 100%; margin: .4rem 0; padding: .6rem; border: 0; border-radius: 6px; cursor: pointer; font-size: .95rem; }
.action-btn.emergency { background: #1e88e5; color: #fff; }
.action-btn.refresh { background: #eeeeee; }
.main-content { flex: 1; padding: 1rem; }
.crop-tag { color: #fff; padding: .2rem .6rem; border-radius: 12px; }
.map-legend { display: flex; gap: 1rem; margin-top: .5rem; font-size: .85rem; }
.legend-color { width: 14px; height: 14px; display: inline-block; }
.legend-color.soif { background: #FF6B6B; }
.legend-color.humide { background: #7ED957; }
.sensor-panel { width: 300px; background: #fff; padding: 1rem; box-shadow: -2px 0 8px rgba(0,0,0,.15); }
.sensor-panel-header { display: flex; justify-content: space-between; align-items: center; }
.close-panel-btn { border: 0; background: none; font-size: 1.5rem; cursor: pointer; }
.status-indicator.needs-water { color: #c62828; }
.status-indicator.optimal { color: #2e7d32; }
"#;

const SCRIPT: &str = r#"
function act(path) {
  fetch(path, { method: 'POST' }).then(function () { location.reload(); });
}
"#;

/// escape html special characters to prevent xss
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// render the full dashboard page
pub fn render_page(dash: &Dashboard) -> String {
    let mut html = String::with_capacity(32 * 1024);
    let _ = write!(
        html,
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>FarmSmart</title><style>{}</style><script>{}</script></head>\n<body>\n<div class=\"app\">\n",
        STYLE, SCRIPT
    );
    render_sidebar(&mut html, dash);
    render_main(&mut html, dash);
    if let Some(sel) = dash.selected() {
        render_panel(&mut html, &sel);
    }
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn render_sidebar(html: &mut String, dash: &Dashboard) {
    let stats = dash.stats();
    let cells = dash.layout().cell_count();
    html.push_str("<div class=\"sidebar\">\n<div class=\"logo\"><h1>🌱 FarmSmart</h1></div>\n<div class=\"plants-menu\">\n");
    for crop in dash.catalog().entries(cells) {
        let thirsty = stats.thirsty_by_crop.get(&crop.key).copied().unwrap_or(0);
        let active = if dash.filter() == crop.key { " active" } else { "" };
        let _ = write!(
            html,
            "<div class=\"plant-item{active}\" style=\"border-left-color: {color}\" onclick=\"act('/api/filter/{key}')\">\
             <h3>{icon} {name}</h3><p>{parcels} parcels</p>\
             <span class=\"water-indicator {state}\">{thirsty} thirsty</span></div>\n",
            active = active,
            color = html_escape(&crop.color),
            key = html_escape(&crop.key),
            icon = html_escape(&crop.icon),
            name = html_escape(&crop.name),
            parcels = crop.parcels.len(),
            state = if thirsty > 0 { "soif" } else { "ok" },
            thirsty = thirsty,
        );
    }
    html.push_str("</div>\n");

    let _ = write!(
        html,
        "<div class=\"status-summary\"><h3>📊 Global status</h3>\
         <p>Thirsty parcels: {}</p><p>Healthy parcels: {}</p><p>Total parcels: {}</p>\
         <p>Live data: {}</p></div>\n",
        stats.thirsty,
        stats.healthy,
        stats.total,
        if dash.source().is_live() { "✅" } else { "❌" }
    );

    let _ = write!(
        html,
        "<div class=\"quick-actions\"><h3>⚡ Quick actions</h3>\
         <button class=\"action-btn emergency\" onclick=\"act('/api/water-all')\">💧 Water {}</button>\
         <button class=\"action-btn refresh\" onclick=\"act('/api/refresh')\">🔄 Refresh data</button></div>\n</div>\n",
        html_escape(&filter_label(dash))
    );
}

/// "all" or the selected crop's name
fn filter_label(dash: &Dashboard) -> String {
    if dash.filter() == ALL_CROPS {
        "all".to_string()
    } else {
        dash.catalog()
            .get(dash.filter())
            .map(|c| c.name.clone())
            .unwrap_or_else(|| dash.filter().to_string())
    }
}

fn render_main(html: &mut String, dash: &Dashboard) {
    let layout = dash.layout();
    let active = match dash.catalog().get(dash.filter()) {
        Some(c) => c.clone(),
        None => CropCatalog::all_entry(layout.cell_count()),
    };
    let scope = if dash.filter() == ALL_CROPS {
        " - showing every crop".to_string()
    } else {
        format!(" - showing {} parcels", active.name.to_lowercase())
    };
    let _ = write!(
        html,
        "<div class=\"main-content\">\n<div class=\"map-header\"><h2>Farm map</h2>\
         <span class=\"crop-tag\" style=\"background-color: {}\">{} {}</span>\
         <p>{}{}</p></div>\n",
        html_escape(&active.color),
        html_escape(&active.icon),
        html_escape(&active.name),
        if dash.source().is_live() { "✅ Live data" } else { "⚠️ Simulated data" },
        html_escape(&scope)
    );

    let _ = write!(
        html,
        "<svg id=\"terrain\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = layout.canvas_width,
        h = layout.canvas_height
    );
    for cell in dash.cells() {
        render_cell(html, dash, cell);
    }
    let selected_id = dash.selected().map(|s| s.marker.id.clone());
    for marker in dash.markers() {
        render_marker(html, marker, selected_id.as_deref() == Some(marker.id.as_str()));
    }
    html.push_str("</svg>\n");

    html.push_str(
        "<div class=\"map-legend\">\
         <span><span class=\"legend-color soif\"></span> Thirsty - needs water</span>\
         <span><span class=\"legend-color humide\"></span> Healthy - level OK</span>\
         <span>● Pump / sprinkler</span><span>▲ Sensor (clickable)</span>\
         <span>🟨 Selected sensor</span></div>\n</div>\n",
    );
}

fn render_cell(html: &mut String, dash: &Dashboard, cell: &Cell) {
    let g = cell.geometry;
    let visible = dash.is_visible(cell);
    let opacity = dash.cell_opacity(cell);
    let (label, info) = if visible { ("#000", "#333") } else { ("#666", "#888") };
    let onclick = if visible {
        format!(" onclick=\"act('/api/cells/{}/toggle')\" style=\"cursor: pointer\"", cell.id)
    } else {
        " style=\"cursor: not-allowed\"".to_string()
    };

    let _ = write!(
        html,
        "<g class=\"cell-group\"{onclick}>\
         <rect x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\" fill=\"{fill}\" opacity=\"{op}\" stroke=\"#2d5016\" stroke-width=\"2\"/>\
         <text x=\"{cx}\" y=\"{ly}\" text-anchor=\"middle\" fill=\"{label}\" font-size=\"12\" font-weight=\"bold\">{id}</text>\
         <text x=\"{cx}\" y=\"{ty}\" text-anchor=\"middle\" fill=\"{info}\" font-size=\"10\">{temp}°C</text>\
         <text x=\"{cx}\" y=\"{hy}\" text-anchor=\"middle\" fill=\"{info}\" font-size=\"10\">{hum}%</text>\
         <circle cx=\"{cx}\" cy=\"{cy}\" r=\"8\" fill=\"#1a237e\" opacity=\"{op}\"/>",
        onclick = onclick,
        x = g.x,
        y = g.y,
        w = g.width,
        h = g.height,
        fill = dash.cell_color(cell),
        op = opacity,
        cx = g.cx,
        cy = g.cy,
        ly = g.cy - 15.0,
        ty = g.cy + 5.0,
        hy = g.cy + 18.0,
        label = label,
        info = info,
        id = cell.id,
        temp = cell.temperature,
        hum = cell.humidity,
    );
    if let Some(crop) = cell.crop.as_deref().and_then(|k| dash.catalog().get(k)) {
        let _ = write!(
            html,
            "<text x=\"{}\" y=\"{}\" font-size=\"14\" opacity=\"{}\">{}</text>",
            g.x + 8.0,
            g.y + 15.0,
            opacity,
            html_escape(&crop.icon)
        );
    }
    if cell.needs_water && visible {
        let _ = write!(
            html,
            "<text x=\"{}\" y=\"{}\" font-size=\"16\" fill=\"#ff4444\">💧</text>",
            g.x + g.width - 15.0,
            g.y + 15.0
        );
    }
    if cell.is_live() {
        let _ = write!(
            html,
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" fill=\"#2196F3\">📡</text>",
            g.x + 8.0,
            g.y + g.height - 8.0
        );
    }
    html.push_str("</g>\n");
}

fn render_marker(html: &mut String, marker: &SensorMarker, selected: bool) {
    let (fill, stroke, width) = if selected {
        ("#ffeb3b", "#ff9800", 2)
    } else {
        ("#2d5016", "none", 0)
    };
    let _ = write!(
        html,
        "<g class=\"sensor-group\" onclick=\"act('/api/markers/{id}/select')\" style=\"cursor: pointer\">\
         <polygon points=\"{points}\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"{width}\"/>\
         <circle cx=\"{x}\" cy=\"{y}\" r=\"5\" fill=\"transparent\"/></g>\n",
        id = marker.id,
        points = marker.points,
        fill = fill,
        stroke = stroke,
        width = width,
        x = marker.x,
        y = marker.y,
    );
}

fn render_panel(html: &mut String, sel: &SelectedSensor<'_>) {
    let cell = sel.cell;
    let crop = sel
        .crop
        .map(|c| format!("{} {}", c.icon, c.name))
        .unwrap_or_else(|| "-".to_string());
    let _ = write!(
        html,
        "<div class=\"sensor-panel\">\n<div class=\"sensor-panel-header\"><h3>📡 Sensor details</h3>\
         <button class=\"close-panel-btn\" onclick=\"act('/api/panel/close')\">×</button></div>\n\
         <div class=\"sensor-badge\"><h4>▲ {id}</h4><span>Row {row}, column {col}</span></div>\n\
         <div class=\"info-section\"><h4>📍 Location</h4><p>Cell: {cell}</p><p>Crop: {crop}</p></div>\n",
        id = sel.marker.id,
        row = sel.marker.row,
        col = sel.marker.col,
        cell = cell.id,
        crop = html_escape(&crop),
    );

    match sel.reading {
        Some(r) => {
            let soil = r
                .soil_moisture
                .map(|v| format!("{}%", v))
                .unwrap_or_else(|| "-".to_string());
            let _ = write!(
                html,
                "<div class=\"info-section\"><h4>📊 Live data</h4>\
                 <p>🌡️ {}°C temperature</p><p>💧 {} soil moisture</p><p>💨 {}% air humidity</p>\
                 <p>Sensor: {}</p></div>\n",
                r.temperature,
                soil,
                r.humidity,
                html_escape(&r.id)
            );
        }
        None => {
            let _ = write!(
                html,
                "<div class=\"info-section\"><h4>📊 Simulated data</h4>\
                 <p>🌡️ {}°C temperature</p><p>💧 {}% humidity</p></div>\n",
                cell.temperature, cell.humidity
            );
        }
    }

    let (class, icon, text, action) = if cell.needs_water {
        ("needs-water", "💧", "Irrigation needed", "💧 Irrigate now")
    } else {
        ("optimal", "✅", "Moisture level optimal", "⏸️ Mark as thirsty")
    };
    let button = format!(
        "<button class=\"action-btn emergency\" onclick=\"act('/api/panel/toggle')\">{}</button>",
        action
    );
    let _ = write!(
        html,
        "<div class=\"info-section\"><h4>🚰 Irrigation status</h4>\
         <div class=\"status-indicator {}\">{} {}</div>{}</div>\n</div>\n",
        class, icon, text, button
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LiveReading;
    use crate::grid::GridLayout;
    use crate::overlay::DEFAULT_MARKER_SCALE;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dashboard() -> Dashboard {
        let layout = GridLayout::default();
        Dashboard::new(
            layout,
            CropCatalog::default_for(layout.cell_count()),
            DEFAULT_MARKER_SCALE,
            StdRng::seed_from_u64(1),
        )
    }

    #[test]
    fn test_escape() {
        assert_eq!(html_escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_page_has_every_cell_and_marker() {
        let page = render_page(&dashboard());
        assert_eq!(page.matches("class=\"cell-group\"").count(), 24);
        assert_eq!(page.matches("class=\"sensor-group\"").count(), 36);
        assert!(page.contains("act('/api/cells/C24/toggle')"));
        assert!(page.contains("⚠️ Simulated data"));
        assert!(!page.contains("sensor-panel\""));
    }

    #[test]
    fn test_filtered_cells_are_inert() {
        let mut d = dashboard();
        d.select_crop("onion").unwrap();
        let page = render_page(&d);
        assert!(!page.contains("act('/api/cells/C1/toggle')"));
        assert!(page.contains("act('/api/cells/C9/toggle')"));
        assert_eq!(page.matches("cursor: not-allowed").count(), 18);
        assert!(page.contains("💧 Water Onions"));
    }

    #[test]
    fn test_panel_shows_live_reading() {
        let mut d = dashboard();
        d.apply_live(&[LiveReading {
            id: "Sensor01".to_string(),
            cell_id: "C1".to_string(),
            crop: None,
            needs_water: true,
            temperature: 28.0,
            humidity: 40.0,
            soil_moisture: Some(15.0),
            latitude: None,
            longitude: None,
        }]);
        d.select_marker("S0-0").unwrap();
        let page = render_page(&d);
        assert!(page.contains("📊 Live data"));
        assert!(page.contains("15% soil moisture"));
        assert!(page.contains("fill=\"#ffeb3b\""));
        assert!(page.contains("Irrigation needed"));
        assert!(page.contains("✅ Live data"));
    }

    #[test]
    fn test_panel_button_ignores_crop_filter() {
        let mut d = dashboard();
        d.select_marker("S0-0").unwrap();
        d.select_crop("mint").unwrap();
        let page = render_page(&d);
        assert!(!page.contains("act('/api/cells/C1/toggle')"));
        assert!(page.contains("act('/api/panel/toggle')"));
    }

    #[test]
    fn test_panel_shows_simulated_reading() {
        let mut d = dashboard();
        d.select_marker("S1-1").unwrap();
        let page = render_page(&d);
        assert!(page.contains("📊 Simulated data"));
        assert!(page.contains("Cell: C10"));
    }
}
