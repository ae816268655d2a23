//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::Role;
use crate::scorer::DEFAULT_RATIO;

/// Tunables for identification.
///
/// Every field has a default, so a partial YAML or JSON file is valid.
///
/// ```yaml
/// student_acceptance_threshold: 10
/// staff_acceptance_threshold: 15
/// ratio_test_factor: 0.75
/// cache_ttl_secs: 1800
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum confidence to accept a student match.
    pub student_acceptance_threshold: f32,

    /// Minimum confidence to accept a staff match.
    pub staff_acceptance_threshold: f32,

    /// Enrollment is rejected as a duplicate when an existing template scores
    /// strictly above this.
    pub duplicate_threshold: f32,

    /// Ratio-test factor, in (0, 1].
    pub ratio_test_factor: f32,

    /// Whole-cache time-to-live in seconds.
    pub cache_ttl_secs: u64,

    /// Corrupted/processed rate above which an alert is logged.
    pub corruption_alert_rate: f32,

    /// Directory for the repair file round-trip. System temp dir if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            student_acceptance_threshold: 10.0,
            staff_acceptance_threshold: 10.0,
            duplicate_threshold: 70.0,
            ratio_test_factor: DEFAULT_RATIO,
            cache_ttl_secs: 3600,
            corruption_alert_rate: 0.2,
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a config file, picking the format from its extension
    /// (`json`, `yaml` or `yml`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let data = std::fs::read_to_string(path)?;
        let cfg = match ext.as_str() {
            "json" => Self::from_json(&data)?,
            "yaml" | "yml" => Self::from_yaml(&data)?,
            _ => return Err(ConfigError::UnsupportedFormat(ext)),
        };
        tracing::debug!(path = %path.display(), "config: loaded");
        Ok(cfg)
    }

    /// Checks every field is within range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ratio_test_factor > 0.0 && self.ratio_test_factor <= 1.0) {
            return Err(invalid(
                "ratio_test_factor",
                format!("{} not in (0, 1]", self.ratio_test_factor),
            ));
        }
        for (field, value) in [
            ("student_acceptance_threshold", self.student_acceptance_threshold),
            ("staff_acceptance_threshold", self.staff_acceptance_threshold),
            ("duplicate_threshold", self.duplicate_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(invalid(field, format!("{value} not in [0, 100]")));
            }
        }
        if self.cache_ttl_secs == 0 {
            return Err(invalid("cache_ttl_secs", "must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.corruption_alert_rate) {
            return Err(invalid(
                "corruption_alert_rate",
                format!("{} not in [0, 1]", self.corruption_alert_rate),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Acceptance threshold for a pool of the given role.
    pub fn threshold_for(&self, role: Role) -> f32 {
        match role {
            Role::Student => self.student_acceptance_threshold,
            Role::Staff => self.staff_acceptance_threshold,
        }
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
