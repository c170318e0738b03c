//! Configuration for the posture rule engine.

use crate::core::geometry::MIN_CONFIDENCE;
use crate::core::rules::{ActivityRegistry, Thresholds};
use crate::core::segmenter::FrameTiming;
use crate::core::session::SessionSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame rate of the decoded source video
    pub fps: f64,

    /// Decoded frames between consecutive sampled frames
    pub stride: u32,

    /// Confidence floor for keypoints used by rules
    pub min_confidence: f64,

    /// Activity used when none is given on the command line
    pub default_activity: String,

    /// Classification threads for batch analysis
    pub workers: usize,

    /// Directory for exported batch reports
    pub export_path: PathBuf,

    /// Per-activity threshold overrides
    pub thresholds: BTreeMap<String, Thresholds>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("posture-rules");

        Self {
            fps: 30.0,
            stride: 5,
            min_confidence: MIN_CONFIDENCE,
            default_activity: "squat".to_string(),
            workers: 1,
            export_path: data_dir.join("reports"),
            thresholds: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("posture-rules")
            .join("config.json")
    }

    /// Frame timing derived from `fps` and `stride`.
    pub fn timing(&self) -> Result<FrameTiming, ConfigError> {
        FrameTiming::new(self.fps, self.stride)
    }

    /// Session parameters derived from this configuration.
    pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
        SessionSettings::new(self.min_confidence, self.timing()?)
    }

    /// Built-in activities with this configuration's threshold overrides applied.
    pub fn registry(&self) -> Result<ActivityRegistry, ConfigError> {
        let mut registry = ActivityRegistry::with_builtins();
        registry.apply_overrides(&self.thresholds)?;
        Ok(registry)
    }

    /// Check every field that can be checked without I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_settings()?;
        self.registry()?.resolve(&self.default_activity)?;
        Ok(())
    }
}

/// Configuration errors. These are the only hard failures of the engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown activity '{activity}' (known: {known})")]
    UnknownActivity { activity: String, known: String },

    #[error("activity '{activity}' has no threshold '{threshold}'")]
    UnknownThreshold { activity: String, threshold: String },

    #[error("activity '{activity}' is missing threshold '{threshold}'")]
    MissingThreshold { activity: String, threshold: String },

    #[error("invalid frame timing: {0}")]
    InvalidTiming(String),

    #[error("min_confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::activities::{KNEE_TOE_OFFSET_MAX, NECK_BEND_MAX_DEG};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fps, 30.0);
        assert_eq!(config.stride, 5);
        assert_eq!(config.min_confidence, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"fps": 25.0, "thresholds": {"squat": {"knee_toe_offset_max": 0.08}}}"#,
        )
        .unwrap();
        assert_eq!(config.fps, 25.0);
        assert_eq!(config.stride, 5);

        let squat = config.registry().unwrap().resolve("squat").unwrap();
        assert_eq!(squat.thresholds().get(KNEE_TOE_OFFSET_MAX), Some(0.08));
    }

    #[test]
    fn test_alias_overrides_reach_canonical_activity() {
        let mut config = Config::default();
        config.thresholds.insert(
            "sitting".to_string(),
            Thresholds::new().with(NECK_BEND_MAX_DEG, 30.0),
        );
        let desk = config.registry().unwrap().resolve("desk_sitting").unwrap();
        assert_eq!(desk.thresholds().get(NECK_BEND_MAX_DEG), Some(30.0));
    }

    #[test]
    fn test_validation_errors() {
        let config = Config {
            stride: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTiming(_))));

        let config = Config {
            default_activity: "yoga".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownActivity { .. })
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join("posture-rules-config-test")
            .join("config.json");
        let mut config = Config::default();
        config.workers = 4;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }
}
