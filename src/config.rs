//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `farm.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - GridConfig: rows/cols of parcels and the canvas they are drawn in.
//!     - BackendConfig: where the external sensor service lives.
//!     - ServerConfig: dashboard bind address.
//!     - PollingConfig: optional background refresh.
//!     - SimulationConfig: seed for synthetic readings.
//!     - crops: optional catalog override ([[crops]] tables).
//!
//! ==============================================================================

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::catalog::CropCatalog;
use crate::domain::Crop;
use crate::grid::GridLayout;
use crate::overlay::DEFAULT_MARKER_SCALE;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FarmConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub crops: Option<Vec<Crop>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    pub padding: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub marker_scale: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        let layout = GridLayout::default();
        Self {
            rows: layout.rows,
            cols: layout.cols,
            padding: layout.padding,
            canvas_width: layout.canvas_width,
            canvas_height: layout.canvas_height,
            marker_scale: DEFAULT_MARKER_SCALE,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PollingConfig {
    /// background refresh period, None = fetch once at startup
    #[serde(default)]
    pub interval_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SimulationConfig {
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}

impl FarmConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    /// Parse and validate a toml document
    pub fn parse(content: &str) -> Result<Self> {
        let config: FarmConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// runs before logging is initialized, so it reports on stdout.
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("farm.toml"),
            std::path::PathBuf::from("..").join("config").join("farm.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        eprintln!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout {
            rows: self.grid.rows,
            cols: self.grid.cols,
            padding: self.grid.padding,
            canvas_width: self.grid.canvas_width,
            canvas_height: self.grid.canvas_height,
        }
    }

    /// configured crops, or the farm default sized to the grid
    pub fn catalog(&self) -> Result<CropCatalog> {
        let cells = self.layout().cell_count();
        match &self.crops {
            Some(crops) => CropCatalog::new(crops.clone(), cells).context("Invalid [[crops]] table"),
            None => Ok(CropCatalog::default_for(cells)),
        }
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend.timeout_seconds.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.layout().validate().context("Invalid [grid] section")?;
        let scale = self.grid.marker_scale;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(anyhow!("marker_scale must be a positive number (got {})", scale));
        }
        if self.polling.interval_seconds == Some(0) {
            return Err(anyhow!("polling.interval_seconds must be at least 1"));
        }
        self.catalog()?;
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│           FARM CONFIGURATION            │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Grid: {} cols x {} rows", self.grid.cols, self.grid.rows);
        tracing::info!("│ Sensor Service: {}", self.backend.base_url);
        tracing::info!("│ Dashboard: {}", self.server.bind);
        match self.polling.interval_seconds {
            Some(s) => tracing::info!("│ Poll Interval: {}s", s),
            None => tracing::info!("│ Poll Interval: startup only"),
        }
        tracing::info!("│ Log Level: {}", self.logging.level);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}
