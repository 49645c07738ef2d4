// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn is_dark(&self) -> bool {
        matches!(self, Theme::Dark)
    }
}

/// Tunables of the live map. Every field has a default so a partial JSON file
/// is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapConfig {
    pub light_style_url: String,
    pub dark_style_url: String,
    pub initial_center: [f64; 2],
    pub initial_zoom: f64,
    pub cluster_radius: u32,
    pub cluster_max_zoom: u32,
    pub fit_padding: f64,
    pub fit_max_zoom: f64,
    /// Zoom used when flying to a selected device.
    pub follow_zoom: f64,
    pub fly_duration_ms: u64,
    pub track_color: String,
    pub track_history_zoom: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            light_style_url: "https://tiles.openfreemap.org/styles/liberty".to_string(),
            dark_style_url: "https://tiles.openfreemap.org/styles/dark".to_string(),
            initial_center: [0.0, 20.0],
            initial_zoom: 2.0,
            cluster_radius: 50,
            cluster_max_zoom: 14,
            fit_padding: 50.0,
            fit_max_zoom: 15.0,
            follow_zoom: 15.0,
            fly_duration_ms: 1000,
            track_color: "#3b82f6".to_string(),
            track_history_zoom: 16.0,
        }
    }
}

impl MapConfig {
    pub fn style_url(&self, theme: Theme) -> &str {
        match theme {
            Theme::Light => &self.light_style_url,
            Theme::Dark => &self.dark_style_url,
        }
    }

    pub fn fly_duration(&self) -> Duration {
        Duration::from_millis(self.fly_duration_ms)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Loads `path` (or the default location), falling back to defaults when
    /// the file does not exist. A file that exists but is broken is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "fleet-map", "FleetMap")
            .map(|dirs| dirs.config_dir().join("map.json"))
            .unwrap_or_else(|| PathBuf::from("map.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, r#"{"followZoom": 12.5, "darkStyleUrl": "dark.json"}"#).unwrap();

        let config = MapConfig::load(&path).unwrap();
        assert_eq!(config.follow_zoom, 12.5);
        assert_eq!(config.style_url(Theme::Dark), "dark.json");
        assert_eq!(config.cluster_radius, 50);
        assert_eq!(config.fly_duration(), Duration::from_millis(1000));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempdir().unwrap();
        let config = MapConfig::load_or_default(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config, MapConfig::default());
    }

    #[test]
    fn test_broken_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MapConfig::load_or_default(Some(&path)),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("map.json");
        let mut config = MapConfig::default();
        config.track_color = "#ff0000".to_string();
        config.save(&path).unwrap();

        assert_eq!(MapConfig::load(&path).unwrap(), config);
    }
}
