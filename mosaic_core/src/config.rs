//! Wall configuration.

use crate::error::ConfigError;
use mosaic_env::BlockState;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Upper bound for `rows`, `columns` and `distance`. Keeps every planned
/// offset well inside `i32` and inside the packed key's height range.
pub const MAX_GRID_EXTENT: usize = 256;

/// Shape of one wall, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutParameters {
    /// Number of grid rows (>= 1)
    pub rows: usize,

    /// Number of grid columns (>= 1)
    pub columns: usize,

    /// Cells between the viewer and the wall, not counting the display
    /// layer mounted in front of the wall.
    pub distance: usize,

    /// Block state painted for every wall cell
    pub wall_surface: BlockState,
}

impl LayoutParameters {
    pub fn new(rows: usize, columns: usize, distance: usize, wall_surface: BlockState) -> Self {
        Self {
            rows,
            columns,
            distance,
            wall_surface,
        }
    }

    /// Cells per page: `rows * columns`.
    pub fn page_size(&self) -> usize {
        self.rows * self.columns
    }
}

impl Default for LayoutParameters {
    fn default() -> Self {
        Self {
            rows: 5,
            columns: 8,
            distance: 3,
            wall_surface: BlockState::new("minecraft:coal_block"),
        }
    }
}

/// Configuration for the session registry and its front-end.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Layout used for every new session
    pub layout: LayoutParameters,

    /// Sessions whose viewer strays further than this (in blocks) from the
    /// wall anchor are closed by the sweep (default: 10)
    pub removal_distance: f64,

    /// Minimum spacing between two semantic interactions, counted across
    /// all viewers (default: 250 ms)
    pub interaction_debounce_ms: u64,

    /// Period of the distance sweep (default: 2000 ms = 40 ticks at 20 Hz)
    pub sweep_period_ms: u64,

    /// Permission required to open a wall
    pub permission_node: String,

    /// Label the request command is registered under
    pub command_label: String,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            layout: LayoutParameters::default(),
            removal_distance: 10.0,
            interaction_debounce_ms: 250,
            sweep_period_ms: 2000,
            permission_node: "mosaic.use".to_string(),
            command_label: "wall".to_string(),
        }
    }
}

impl WallConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.rows == 0 || self.layout.columns == 0 {
            return Err(ConfigError::Invalid("rows and columns must both be at least 1".into()));
        }
        let layout = &self.layout;
        if layout.rows > MAX_GRID_EXTENT || layout.columns > MAX_GRID_EXTENT || layout.distance > MAX_GRID_EXTENT {
            return Err(ConfigError::Invalid(format!(
                "rows, columns and distance must not exceed {}",
                MAX_GRID_EXTENT
            )));
        }
        if self.removal_distance.is_nan() || self.removal_distance <= 0.0 {
            return Err(ConfigError::Invalid("removal_distance must be positive".into()));
        }
        Ok(())
    }

    pub fn removal_distance_squared(&self) -> f64 {
        self.removal_distance * self.removal_distance
    }

    pub fn interaction_debounce(&self) -> Duration {
        Duration::from_millis(self.interaction_debounce_ms)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WallConfig::default();
        assert_eq!(config.layout.page_size(), 40);
        assert_eq!(config.removal_distance_squared(), 100.0);
        assert_eq!(config.interaction_debounce(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = WallConfig::from_json_str(r#"{ "layout": { "rows": 2 }, "removal_distance": 6.5 }"#).unwrap();
        assert_eq!(config.layout.rows, 2);
        assert_eq!(config.layout.columns, 8);
        assert_eq!(config.layout.wall_surface, BlockState::new("minecraft:coal_block"));
        assert_eq!(config.removal_distance, 6.5);
        assert_eq!(config.sweep_period_ms, 2000);
    }

    #[test]
    fn test_zero_columns_rejected() {
        let err = WallConfig::from_json_str(r#"{ "layout": { "columns": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_oversized_layout_rejected() {
        let mut config = WallConfig::default();
        config.layout.distance = MAX_GRID_EXTENT + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let err = WallConfig::from_json_str(r#"{ "layout": { "columns": 4294967296 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        config.layout.distance = MAX_GRID_EXTENT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = WallConfig::from_json_str("{ rows: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
