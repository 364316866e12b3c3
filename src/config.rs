// Player configuration, stored as RON
//
// Every field has a default, so a config file only needs the values it changes:
//
//     (
//         default_bpm: 96.0,
//         click_sample: Some("/usr/share/sounds/click.wav"),
//         tone: (frequency: 440.0),
//     )

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::LevelFilter;
use serde::Deserialize;

use crate::sequencer::timeline::Tempo;
use crate::synth::tone::ToneSettings;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Tempo used until the host starts the metronome
    pub default_bpm: f64,
    /// WAV file for the metronome click, synthesized when absent
    pub click_sample: Option<PathBuf>,
    pub click_volume: f32,
    pub master_volume: f32,
    pub tone: ToneSettings,
    /// Host commands buffered before the reader blocks
    pub command_capacity: usize,
    /// Player → audio thread queue size
    pub audio_queue_capacity: usize,
    pub log_level: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_bpm: Tempo::DEFAULT_BPM,
            click_sample: None,
            click_volume: 1.0,
            master_volume: 1.0,
            tone: ToneSettings::default(),
            command_capacity: 64,
            audio_queue_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

/// Where the active configuration came from
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
    /// The file at `path` could not be used, defaults apply
    Fallback { path: PathBuf, error: ConfigError },
}

impl PlayerConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Tempo::new(self.default_bpm).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        check_unit("click_volume", self.click_volume)?;
        check_unit("master_volume", self.master_volume)?;
        check_unit("tone.gain", self.tone.gain)?;

        if !self.tone.frequency.is_finite() || self.tone.frequency <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tone.frequency must be positive, got {}",
                self.tone.frequency
            )));
        }
        if !(self.tone.length_ratio > 0.0 && self.tone.length_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "tone.length_ratio must be in (0, 1], got {}",
                self.tone.length_ratio
            )));
        }
        if !(self.tone.ramp_ms >= 0.0 && self.tone.ramp_ms.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "tone.ramp_ms must be >= 0, got {}",
                self.tone.ramp_ms
            )));
        }
        if self.command_capacity == 0 || self.audio_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue capacities must be at least 1".to_string(),
            ));
        }

        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)))?;

        Ok(())
    }

    /// `<config_dir>/rhythm_player/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rhythm_player").join("config.ron"))
    }

    /// Load `explicit` if given, else the default file if it exists, else defaults.
    /// Never fails: a file that cannot be used is reported through `ConfigSource::Fallback`.
    pub fn load(explicit: Option<&Path>) -> (Self, ConfigSource) {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return (Self::default(), ConfigSource::Defaults),
            },
        };

        match Self::from_file(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(error) => (Self::default(), ConfigSource::Fallback { path, error }),
        }
    }

    pub fn tempo(&self) -> Tempo {
        Tempo::new(self.default_bpm).unwrap_or_default()
    }

    pub fn log_level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be between 0 and 1, got {}",
            name, value
        )))
    }
}
