//! Game configuration loaded from JSON.
//!
//! Every section has a default, so an empty object (`{}`) is a valid config
//! and the binary runs with no file at all.
//!
//! ```
//! use garrison_engine::config::GameConfig;
//!
//! let config = GameConfig::from_json_str(r#"{ "map": { "width": 32, "height": 32 } }"#).unwrap();
//! assert_eq!(config.map.width, 32);
//! assert!(config.units.contains_key("soldier"));
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tick::TickConfig;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickSettings {
    /// Seconds per tick.
    pub fixed_dt: f64,
}

impl Default for TickSettings {
    fn default() -> Self {
        Self { fixed_dt: 1.0 / 10.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
        }
    }
}

/// Balance data for one unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Resource deducted from the producing base on completion.
    pub cost: u32,
    /// Ticks a build order occupies before it resolves.
    pub build_time: u32,
    pub health: u32,
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick: TickSettings,
    pub map: MapSettings,
    /// Unit catalog keyed by type name.
    pub units: BTreeMap<String, UnitSpec>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let units = [
            ("worker", 50, 3, 40),
            ("soldier", 50, 5, 100),
            ("scout", 30, 2, 30),
        ]
        .into_iter()
        .map(|(name, cost, build_time, health)| {
            (
                name.to_owned(),
                UnitSpec {
                    cost,
                    build_time,
                    health,
                },
            )
        })
        .collect();

        Self {
            tick: TickSettings::default(),
            map: MapSettings::default(),
            units,
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let dt = self.tick.fixed_dt;
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "tick.fixed_dt must be positive and finite, got {dt}"
            )));
        }
        if self.map.width == 0 || self.map.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "map must be non-empty, got {}x{}",
                self.map.width, self.map.height
            )));
        }
        if self.map.width > i32::MAX as u32 || self.map.height > i32::MAX as u32 {
            return Err(ConfigError::Invalid("map dimensions exceed i32 range".to_owned()));
        }
        if let Some((name, _)) = self.units.iter().find(|(_, spec)| spec.build_time == 0) {
            return Err(ConfigError::Invalid(format!(
                "unit '{name}' has build_time 0 (must be at least 1)"
            )));
        }
        Ok(())
    }

    /// Tick loop settings derived from the `tick` section.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            fixed_dt: self.tick.fixed_dt,
        }
    }

    /// BLAKE3 hex digest of the canonical JSON form, recorded in replay logs.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = GameConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.units["soldier"].cost, 50);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = GameConfig::from_json_str(
            r#"{ "tick": { "fixed_dt": 0.05 }, "units": { "tank": { "cost": 200, "build_time": 8, "health": 400 } } }"#,
        )
        .unwrap();
        assert_eq!(config.tick.fixed_dt, 0.05);
        assert_eq!(config.map, MapSettings::default());
        assert_eq!(config.units.len(), 1);
        assert_eq!(config.units["tank"].build_time, 8);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero_dt = GameConfig::from_json_str(r#"{ "tick": { "fixed_dt": 0.0 } }"#);
        assert!(matches!(zero_dt, Err(ConfigError::Invalid(_))));

        let empty_map = GameConfig::from_json_str(r#"{ "map": { "width": 0, "height": 10 } }"#);
        assert!(matches!(empty_map, Err(ConfigError::Invalid(_))));

        let instant = GameConfig::from_json_str(
            r#"{ "units": { "ghost": { "cost": 1, "build_time": 0, "health": 1 } } }"#,
        );
        assert!(matches!(instant, Err(ConfigError::Invalid(ref m)) if m.contains("ghost")));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            GameConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            GameConfig::from_path("/nonexistent/garrison.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = GameConfig::default();
        let mut b = GameConfig::default();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.map.width += 1;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
