use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;

use crate::auto_align::DistributionMode;
use crate::file_utils::FileManager;
use crate::timeline::RestPolicy;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Frames per second new documents start with
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Phoneme set new documents start with
    #[serde(default = "default_phoneme_set")]
    pub phoneme_set: String,

    /// Hold the last phoneme of a word for one extra frame before resting
    #[serde(default = "default_true")]
    pub rest_after_words: bool,

    /// Hold each phoneme for one extra frame before resting
    #[serde(default = "default_true")]
    pub rest_after_phonemes: bool,

    /// How automatic alignment spreads phonemes into words
    #[serde(default)]
    pub distribution_mode: DistributionMode,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_fps() -> u32 {
    24
}

fn default_phoneme_set() -> String {
    "preston_blair".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = FileManager::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Invalid configuration file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        FileManager::write_to_file(path, &content)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(anyhow!("fps must be positive"));
        }
        if self.phoneme_set.trim().is_empty() {
            return Err(anyhow!("phoneme_set must not be empty"));
        }
        Ok(())
    }

    /// Rest handling as the playback and export layers consume it
    pub fn rest_policy(&self) -> RestPolicy {
        RestPolicy {
            rest_after_words: self.rest_after_words,
            rest_after_phonemes: self.rest_after_phonemes,
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            fps: default_fps(),
            phoneme_set: default_phoneme_set(),
            rest_after_words: true,
            rest_after_phonemes: true,
            distribution_mode: DistributionMode::default(),
            log_level: LogLevel::default(),
        }
    }
}
