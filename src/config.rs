/// Configuration for the snore monitor
///
/// Calibration constants for the gates and the trigger. Defaults match the
/// shipped tuning; a JSON file can override any subset of fields.

use crate::alert::DEFAULT_ALERT_COOLDOWN_MS;
use crate::audio::DEFAULT_SNORE_THRESHOLD;
use crate::vision::DEFAULT_DETECT_INTERVAL_MS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config format: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minimum spacing between vision inference submissions (milliseconds).
    pub detect_interval_ms: u64,

    /// Minimum spacing between two haptic alerts (milliseconds).
    pub alert_cooldown_ms: u64,

    /// Decision threshold on the [0, 1] snoring likelihood score.
    pub snore_threshold: f32,

    /// Category label the vision detector reports for people.
    pub person_label: String,

    /// Capacity of the detection event queue.
    pub event_queue_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            detect_interval_ms: DEFAULT_DETECT_INTERVAL_MS,
            alert_cooldown_ms: DEFAULT_ALERT_COOLDOWN_MS,
            snore_threshold: DEFAULT_SNORE_THRESHOLD,
            person_label: "person".to_string(),
            event_queue_size: 64,
        }
    }
}

impl MonitorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detect_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "detect_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.alert_cooldown_ms == 0 {
            return Err(ConfigError::Invalid(
                "alert_cooldown_ms must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.snore_threshold) {
            return Err(ConfigError::Invalid(
                "snore_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.person_label.is_empty() {
            return Err(ConfigError::Invalid(
                "person_label must not be empty".to_string(),
            ));
        }

        if self.event_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Load and validate a configuration from a JSON file. Missing fields
    /// fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;

        debug!("loaded config from {}: {:?}", path.as_ref().display(), config);
        Ok(config)
    }
}
