//! Configuration loading and typed config structures for the Providence simulation.
//!
//! The canonical configuration lives in `providence-config.yaml` at the
//! project root. Every field is optional; an empty file (or no file at all)
//! yields the stock game balance.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible game.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level game configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameConfig {
    /// Clock settings.
    #[serde(default)]
    pub time: TimeConfig,

    /// Faith thresholds.
    #[serde(default)]
    pub faith: FaithConfig,

    /// Divine power economy.
    #[serde(default)]
    pub power: PowerConfig,

    /// Oracle costs.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Generation request options and validation bounds.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Observer HTTP server.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GameConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `PROVIDENCE_OBSERVER_PORT` overrides `observer.port` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values are inconsistent.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values are inconsistent.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.observer.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulation cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };
        if self.time.ms_per_game_hour == 0 {
            return invalid("time.ms_per_game_hour must be positive");
        }
        if self.time.start_hour >= providence_types::HOURS_PER_DAY {
            return invalid("time.start_hour must be below 24");
        }
        if self.power.initial > self.power.max {
            return invalid("power.initial must not exceed power.max");
        }
        if self.faith.floor >= self.faith.target {
            return invalid("faith.floor must be below faith.target");
        }
        if crate::cast::location(&self.generation.default_location).is_none() {
            return invalid("generation.default_location is not a known location");
        }
        if self.generation.thought_max_chars == 0 {
            return invalid("generation.thought_max_chars must be positive");
        }
        Ok(())
    }
}

/// Clock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeConfig {
    /// Hour of day 1 the game starts at.
    #[serde(default = "default_start_hour")]
    pub start_hour: u8,

    /// Real milliseconds per game hour at 1x speed.
    #[serde(default = "default_ms_per_game_hour")]
    pub ms_per_game_hour: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            ms_per_game_hour: default_ms_per_game_hour(),
        }
    }
}

/// Faith thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FaithConfig {
    /// Global faith at or above which the game is won.
    #[serde(default = "default_faith_target")]
    pub target: i32,

    /// Global faith at or below which the game is lost.
    #[serde(default)]
    pub floor: i32,

    /// Agents with faith strictly above this are treated as devout by
    /// fallback reactions.
    #[serde(default = "default_devout_threshold")]
    pub devout_threshold: u8,
}

impl Default for FaithConfig {
    fn default() -> Self {
        Self {
            target: default_faith_target(),
            floor: 0,
            devout_threshold: default_devout_threshold(),
        }
    }
}

/// Divine power economy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PowerConfig {
    /// Power at game start.
    #[serde(default = "default_initial_power")]
    pub initial: u32,

    /// Regeneration cap.
    #[serde(default = "default_max_power")]
    pub max: u32,

    /// Power regained per game hour.
    #[serde(default = "default_regen_per_hour")]
    pub regen_per_hour: u32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            initial: default_initial_power(),
            max: default_max_power(),
            regen_per_hour: default_regen_per_hour(),
        }
    }
}

/// Oracle costs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OracleConfig {
    /// Cost of a message oracle.
    #[serde(default = "default_message_cost")]
    pub message_cost: u32,

    /// Cost of a holy light oracle.
    #[serde(default = "default_holy_light_cost")]
    pub holy_light_cost: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            message_cost: default_message_cost(),
            holy_light_cost: default_holy_light_cost(),
        }
    }
}

/// Generation request options and validation bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature sent to the generation service.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token cap sent to the generation service.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Generated thoughts are truncated to this many characters.
    #[serde(default = "default_thought_max_chars")]
    pub thought_max_chars: usize,

    /// Substitute for generated locations that do not exist.
    #[serde(default = "default_location")]
    pub default_location: String,

    /// Directory with `*.j2` prompt overrides. Built-in templates are used
    /// for anything not found there.
    #[serde(default)]
    pub templates_dir: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            thought_max_chars: default_thought_max_chars(),
            default_location: default_location(),
            templates_dir: None,
        }
    }
}

/// Observer HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl ObserverConfig {
    /// Override the port from `PROVIDENCE_OBSERVER_PORT` when set and valid.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("PROVIDENCE_OBSERVER_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.port = port;
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_start_hour() -> u8 {
    6
}

const fn default_ms_per_game_hour() -> u64 {
    5000
}

const fn default_faith_target() -> i32 {
    100
}

const fn default_devout_threshold() -> u8 {
    50
}

const fn default_initial_power() -> u32 {
    50
}

const fn default_max_power() -> u32 {
    100
}

const fn default_regen_per_hour() -> u32 {
    2
}

const fn default_message_cost() -> u32 {
    10
}

const fn default_holy_light_cost() -> u32 {
    20
}

const fn default_temperature() -> f32 {
    0.8
}

const fn default_max_output_tokens() -> u32 {
    8192
}

const fn default_thought_max_chars() -> usize {
    200
}

fn default_location() -> String {
    "plaza".to_owned()
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}
