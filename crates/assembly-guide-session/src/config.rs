//! Engine configuration as JSON.

use crate::error::ConfigError;
use assembly_guide_core::{CanonicalSize, PhotometricParams};
use assembly_guide_zones::DetectorParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::Path};

/// What happens after the last step of a preset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionPolicy {
    /// Stop and forget the cursor.
    #[default]
    Halt,
    /// Start the preset again from step 0.
    Loop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Countdown length in ticks before a page counts as complete.
    pub countdown_ticks: u32,
    pub tick_period_ms: u64,
    /// How long an image step stays up before auto-advancing.
    pub image_dwell_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 5,
            tick_period_ms: 1000,
            image_dwell_ms: 5000,
        }
    }
}

impl TimingConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn image_dwell(&self) -> Duration {
        Duration::from_millis(self.image_dwell_ms)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub canonical: CanonicalSize,
    pub photometric: PhotometricParams,
    pub detector: DetectorParams,
    pub timing: TimingConfig,
    pub completion: CompletionPolicy,
}

impl EngineConfig {
    /// Load a JSON config from disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canonical.width == 0 || self.canonical.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "canonical size {}x{}",
                self.canonical.width, self.canonical.height
            )));
        }
        if self.timing.countdown_ticks == 0 {
            return Err(ConfigError::Invalid("countdown_ticks must be > 0".into()));
        }
        if self.timing.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("tick_period_ms must be > 0".into()));
        }
        if self.detector.sample_stride == 0 {
            return Err(ConfigError::Invalid("sample_stride must be > 0".into()));
        }
        let reachable = self.detector.weights.total();
        if self.detector.vote_minimum > reachable {
            return Err(ConfigError::Invalid(format!(
                "vote_minimum {} exceeds total vote weight {reachable}",
                self.detector.vote_minimum
            )));
        }
        self.photometric
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
