// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph core settings.
//!
//! Settings are stored as RON next to the assets that use them. A missing
//! file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "lattice.settings.ron";

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid settings RON
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be encoded
    #[error("Failed to encode settings: {0}")]
    Encode(#[from] ron::Error),
}

/// Tunables for materialization, loading and inlining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Settings format version
    pub version: u32,
    /// Deepest subgraph nesting `realize` will expand
    pub max_realize_depth: usize,
    /// Deepest relay chain followed when inferring boundary port shapes
    pub max_boundary_walk_depth: usize,
    /// Drop loaded edges whose endpoint types are no longer compatible
    pub drop_incompatible_edges_on_load: bool,
    /// Reset input value slots to their default when their last edge goes
    pub reset_inputs_on_disconnect: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            max_realize_depth: 32,
            max_boundary_walk_depth: 64,
            drop_incompatible_edges_on_load: true,
            reset_inputs_on_disconnect: true,
        }
    }
}

impl GraphSettings {
    /// Parse settings from RON
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }

    /// Encode settings as pretty RON
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&text)?;
        if settings.version != SETTINGS_FORMAT_VERSION {
            tracing::warn!(
                "Settings {:?} have version {}, expected {}",
                path,
                settings.version,
                SETTINGS_FORMAT_VERSION
            );
        }
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GraphSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert!(settings.max_realize_depth > 0);
        assert!(settings.reset_inputs_on_disconnect);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings = GraphSettings::from_ron("(max_realize_depth: 4)").unwrap();
        assert_eq!(settings.max_realize_depth, 4);
        assert_eq!(settings.max_boundary_walk_depth, 64);
    }

    #[test]
    fn test_serialization() {
        let settings = GraphSettings {
            drop_incompatible_edges_on_load: false,
            ..GraphSettings::default()
        };
        let text = settings.to_ron().unwrap();
        assert_eq!(GraphSettings::from_ron(&text).unwrap(), settings);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("lattice-settings-that-does-not-exist.ron");
        assert_eq!(GraphSettings::load(&path).unwrap(), GraphSettings::default());
    }
}
