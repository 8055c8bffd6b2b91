//! Configuration for mqtt-scripts
//!
//! The engine is configured from a YAML file plus `MQTTSCRIPTS_*`
//! environment overrides.
//!
//! # Example
//!
//! ```ignore
//! use ms_config::EngineConfig;
//!
//! let mut config = EngineConfig::load("/etc/mqtt-scripts.yaml")?;
//! config.apply_env_overrides()?;
//! config.validate()?;
//! ```

mod engine_config;
mod error;

pub use engine_config::{EngineConfig, Verbosity, ENV_PREFIX};
pub use error::{ConfigError, ConfigResult};
