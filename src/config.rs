//! Application configuration
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults (Wellington, zoom 13)
//! 2. `config.json` in the user's config directory:
//!    - Linux: ~/.config/tree-batch-map/config.json
//!    - macOS: ~/Library/Application Support/tree-batch-map/config.json
//!    - Windows: %APPDATA%\tree-batch-map\config.json
//! 3. Environment variables (`TREE_MAP_DATA`, `TREE_MAP_LAT`, `TREE_MAP_LON`,
//!    `TREE_MAP_ZOOM`, `TREE_MAP_TILES`)
//! 4. The first command-line argument, taken as the data file path

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::ui::tiles::OSM_TILE_URL;

/// What to do with a row whose location or height cannot be read
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Drop the row and log a warning
    #[default]
    Skip,
    /// Fail the whole load
    Abort,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Tree table (JSON rows, WGS84 point geometry)
    pub data_path: PathBuf,
    /// Initial map centre as [latitude, longitude]
    pub map_center: [f64; 2],
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub on_malformed: MalformedPolicy,
    /// Base map tiles as a `{z}/{x}/{y}` URL template; empty turns tiles off
    pub tile_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/wcc_trees.json"),
            map_center: [-41.30951339423008, 174.82131380244542],
            zoom: 13.0,
            min_zoom: 3.0,
            max_zoom: 19.0,
            on_malformed: MalformedPolicy::Skip,
            tile_url: OSM_TILE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Build the effective configuration for this run.
    ///
    /// A missing config file is not an error; a broken one is logged
    /// and replaced by the defaults.
    pub fn load(args: &[String]) -> Self {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring config file: {e}");
                Self::default()
            }),
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.apply_args(args);
        config
    }

    /// Where the config file is expected to live
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("tree-batch-map");
        path.push("config.json");
        Some(path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply environment overrides. Values that do not parse, are not
    /// finite or lie outside the latitude/longitude ranges are ignored.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let number = |key: &str| {
            var(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        if let Some(path) = var("TREE_MAP_DATA") {
            self.data_path = PathBuf::from(path);
        }
        if let Some(lat) = number("TREE_MAP_LAT").filter(|v| (-90.0..=90.0).contains(v)) {
            self.map_center[0] = lat;
        }
        if let Some(lon) = number("TREE_MAP_LON").filter(|v| (-180.0..=180.0).contains(v)) {
            self.map_center[1] = lon;
        }
        if let Some(zoom) = number("TREE_MAP_ZOOM") {
            self.zoom = zoom;
        }
        if let Some(url) = var("TREE_MAP_TILES") {
            self.tile_url = url;
        }
    }

    /// Disk cache for downloaded map tiles
    pub fn tile_cache_dir() -> Option<PathBuf> {
        let mut path = dirs::cache_dir()?;
        path.push("tree-batch-map");
        path.push("tiles");
        Some(path)
    }

    fn apply_args(&mut self, args: &[String]) {
        if let Some(path) = args.get(1).filter(|arg| !arg.starts_with('-')) {
            self.data_path = PathBuf::from(path);
        }
    }

    /// Initial zoom, kept inside the allowed zoom range
    pub fn initial_zoom(&self) -> f64 {
        self.zoom.clamp(self.min_zoom, self.max_zoom.max(self.min_zoom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AppConfig::from_json(r#"{ "zoom": 15.0, "on_malformed": "abort" }"#).unwrap();
        assert_eq!(config.zoom, 15.0);
        assert_eq!(config.on_malformed, MalformedPolicy::Abort);
        assert_eq!(config.map_center, AppConfig::default().map_center);
        assert_eq!(config.data_path, AppConfig::default().data_path);
    }

    #[test]
    fn test_broken_config_is_an_error() {
        assert!(matches!(
            AppConfig::from_json("{ zoom: }"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "TREE_MAP_DATA" => Some("/tmp/trees.json".to_string()),
            "TREE_MAP_LAT" => Some("-36.85".to_string()),
            "TREE_MAP_ZOOM" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.data_path, PathBuf::from("/tmp/trees.json"));
        assert_eq!(config.map_center[0], -36.85);
        assert_eq!(config.map_center[1], AppConfig::default().map_center[1]);
        assert_eq!(config.zoom, 13.0);
    }

    #[test]
    fn test_env_rejects_non_finite_and_out_of_range() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "TREE_MAP_LAT" => Some("NaN".to_string()),
            "TREE_MAP_LON" => Some("inf".to_string()),
            "TREE_MAP_ZOOM" => Some("-infinity".to_string()),
            _ => None,
        });
        assert_eq!(config, AppConfig::default());

        config.apply_env(|key| match key {
            "TREE_MAP_LAT" => Some("91".to_string()),
            "TREE_MAP_LON" => Some("-180.5".to_string()),
            _ => None,
        });
        assert_eq!(config.map_center, AppConfig::default().map_center);

        config.apply_env(|key| match key {
            "TREE_MAP_LAT" => Some("-90".to_string()),
            "TREE_MAP_LON" => Some("180".to_string()),
            "TREE_MAP_TILES" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.map_center, [-90.0, 180.0]);
        assert!(config.tile_url.is_empty());
    }

    #[test]
    fn test_default_tiles_are_openstreetmap() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.tile_url, "https://tile.openstreetmap.org/{z}/{x}/{y}.png");
    }

    #[test]
    fn test_first_argument_is_data_path() {
        let mut config = AppConfig::default();
        config.apply_args(&["tree-batch-map".to_string(), "--verbose".to_string()]);
        assert_eq!(config.data_path, AppConfig::default().data_path);

        config.apply_args(&["tree-batch-map".to_string(), "trees.json".to_string()]);
        assert_eq!(config.data_path, PathBuf::from("trees.json"));
    }

    #[test]
    fn test_initial_zoom_is_clamped() {
        let config = AppConfig {
            zoom: 25.0,
            ..AppConfig::default()
        };
        assert_eq!(config.initial_zoom(), 19.0);
    }
}
