//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "MQTTSCRIPTS_";

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl Verbosity {
    /// Parse a verbosity name; unknown names fall back to `info`
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "error" => Verbosity::Error,
            "warn" => Verbosity::Warn,
            "debug" => Verbosity::Debug,
            "info" => Verbosity::Info,
            other => {
                warn!(verbosity = other, "Unknown verbosity, using info");
                Verbosity::Info
            }
        }
    }

    /// The tracing filter directive for this level
    pub fn as_filter(&self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warn => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        }
    }
}

fn deserialize_verbosity<'de, D>(deserializer: D) -> Result<Verbosity, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(Verbosity::parse_lenient(&name))
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Instance name, used as client id and as prefix of the state topic
    #[serde(default = "default_name")]
    pub name: String,

    /// Broker URL handed to the broker client
    #[serde(default = "default_url")]
    pub url: String,

    /// Latitude used for solar event times
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    /// Longitude used for solar event times
    #[serde(default = "default_longitude")]
    pub longitude: f64,

    /// Log verbosity
    #[serde(default, deserialize_with = "deserialize_verbosity")]
    pub verbosity: Verbosity,

    /// Directory of the log file, stdout when unset
    #[serde(default)]
    pub logdir: Option<PathBuf>,

    /// Quiet period of retained messages before units are loaded
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_name() -> String {
    "logic".to_string()
}

fn default_url() -> String {
    "mqtt://127.0.0.1".to_string()
}

fn default_latitude() -> f64 {
    48.7408
}

fn default_longitude() -> f64 {
    9.1778
}

fn default_settle_ms() -> u64 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            url: default_url(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            verbosity: Verbosity::default(),
            logdir: None,
            settle_ms: default_settle_ms(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `MQTTSCRIPTS_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from `(KEY, value)` pairs
    ///
    /// Keys are matched case-insensitively after stripping [`ENV_PREFIX`].
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = key.to_lowercase();
            let value = value.as_ref();

            match key.as_str() {
                "name" => self.name = value.to_string(),
                "url" => self.url = value.to_string(),
                "latitude" => self.latitude = parse_number(&key, value)?,
                "longitude" => self.longitude = parse_number(&key, value)?,
                "verbosity" => self.verbosity = Verbosity::parse_lenient(value),
                "logdir" if value.trim().is_empty() => self.logdir = None,
                "logdir" => self.logdir = Some(PathBuf::from(value)),
                "settle_ms" => self.settle_ms = parse_number(&key, value)?,
                other => debug!(key = other, "Ignoring unknown environment override"),
            }
        }
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::InvalidValue {
                key: "latitude".to_string(),
                reason: format!("{} is outside -90..=90", self.latitude),
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::InvalidValue {
                key: "longitude".to_string(),
                reason: format!("{} is outside -180..=180", self.longitude),
            });
        }
        if self.name.is_empty() || self.name.contains(['+', '#']) {
            return Err(ConfigError::InvalidValue {
                key: "name".to_string(),
                reason: "must be a non-empty topic segment without wildcards".to_string(),
            });
        }
        Ok(())
    }

    /// Topic carrying the online/offline state of this instance
    pub fn state_topic(&self) -> String {
        format!("{}/state", self.name)
    }

    /// Log file inside `logdir`, named after the instance
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logdir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", self.name)))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{}' is not a number", value),
    })
}
