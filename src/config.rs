// Arranger configuration
// One explicit structure carrying every tunable; loadable from TOML overrides

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::audio::OnsetConfig;
use crate::groove::TempoConfig;
use crate::render::RenderConfig;
use crate::structure::SegmentationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration passed to analysis, editing and rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrangerConfig {
    /// Beats per bar used when converting bars to seconds
    pub beats_per_bar: u32,

    pub segmentation: SegmentationConfig,
    pub render: RenderConfig,
    pub onset: OnsetConfig,
    pub tempo: TempoConfig,
}

impl Default for ArrangerConfig {
    fn default() -> Self {
        ArrangerConfig {
            beats_per_bar: 4,
            segmentation: SegmentationConfig::default(),
            render: RenderConfig::default(),
            onset: OnsetConfig::default(),
            tempo: TempoConfig::default(),
        }
    }
}

impl ArrangerConfig {
    /// Parse TOML; missing keys fall back to defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ArrangerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would make analysis or rendering meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;

        if self.beats_per_bar == 0 {
            return Err(ConfigError::Invalid("beats_per_bar must be >= 1".into()));
        }
        if seg.window_size < 16 || seg.hop_size == 0 {
            return Err(ConfigError::Invalid(
                "segmentation window_size must be >= 16 and hop_size >= 1".into(),
            ));
        }
        if seg.max_frames < 2 {
            return Err(ConfigError::Invalid("segmentation max_frames must be >= 2".into()));
        }
        if seg.mel_bands == 0 || seg.mfcc_count == 0 || seg.mfcc_count > seg.mel_bands {
            return Err(ConfigError::Invalid(
                "mfcc_count must be between 1 and mel_bands".into(),
            ));
        }
        if !(seg.bandwidth_floor > 0.0) {
            return Err(ConfigError::Invalid("bandwidth_floor must be > 0".into()));
        }
        if !(seg.min_peak_separation > 0.0) {
            return Err(ConfigError::Invalid("min_peak_separation must be > 0".into()));
        }
        if !(self.render.fade_duration >= 0.0) {
            return Err(ConfigError::Invalid("fade_duration must be >= 0".into()));
        }
        if self.onset.window_size == 0 || self.onset.hop_size == 0 {
            return Err(ConfigError::Invalid("onset window and hop must be >= 1".into()));
        }
        if self.tempo.min_bpm <= 0.0 || self.tempo.max_bpm <= self.tempo.min_bpm {
            return Err(ConfigError::Invalid("tempo range must satisfy 0 < min < max".into()));
        }

        Ok(())
    }
}
