//! Editor configuration loaded from a TOML file.

use crate::atlas::AtlasOptions;
use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables of the editor engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Undo entries kept before the oldest is evicted.
    #[serde(default = "default_undo_history_cap")]
    pub undo_history_cap: usize,
    /// Quiet period in milliseconds before a snapshot is written.
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,
    /// Distance within which dragged nodes snap onto orbit points.
    #[serde(default = "default_orbit_snap_threshold")]
    pub orbit_snap_threshold: f64,
    /// Cell size of the hit-test index.
    #[serde(default = "default_spatial_cell_size")]
    pub spatial_cell_size: f64,
    /// Atlas packing options used on export.
    #[serde(default)]
    pub atlas: AtlasOptions,
}

fn default_undo_history_cap() -> usize { constants::MAX_UNDO_HISTORY }
fn default_persist_debounce_ms() -> u64 { constants::PERSIST_DEBOUNCE_MS }
fn default_orbit_snap_threshold() -> f64 { constants::ORBIT_SNAP_THRESHOLD }
fn default_spatial_cell_size() -> f64 { constants::SPATIAL_CELL_SIZE }

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_history_cap: default_undo_history_cap(),
            persist_debounce_ms: default_persist_debounce_ms(),
            orbit_snap_threshold: default_orbit_snap_threshold(),
            spatial_cell_size: default_spatial_cell_size(),
            atlas: AtlasOptions::default(),
        }
    }
}

impl EditorConfig {
    /// Debounce window as a duration.
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

/// Loads the configuration at `path`.
/// Falls back to defaults if the file is missing or invalid.
pub fn load_config(path: &Path) -> EditorConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse {}: {}", path.display(), err);
                EditorConfig::default()
            }
        },
        Err(err) => {
            log::debug!("No config at {} ({}), using defaults", path.display(), err);
            EditorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_constants() {
        let config = EditorConfig::default();
        assert_eq!(config.undo_history_cap, 100);
        assert_eq!(config.persist_debounce(), Duration::from_millis(300));
        assert_eq!(config.orbit_snap_threshold, 30.0);
        assert_eq!(config.atlas.scale_factor, 2.0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: EditorConfig = toml::from_str(
            r#"
            undo_history_cap = 5

            [atlas]
            max_width = 1024.0
            "#,
        )
        .unwrap();

        assert_eq!(config.undo_history_cap, 5);
        assert_eq!(config.spatial_cell_size, 100.0);
        assert_eq!(config.atlas.max_width, 1024.0);
        assert_eq!(config.atlas.padding, 4.0);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skilltree.toml");
        std::fs::write(&path, "undo_history_cap = \"lots\"").unwrap();

        assert_eq!(load_config(&path), EditorConfig::default());
        assert_eq!(load_config(&dir.path().join("missing.toml")), EditorConfig::default());
    }
}
