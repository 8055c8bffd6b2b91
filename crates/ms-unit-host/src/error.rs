//! Error types for unit loading and module resolution

use std::path::PathBuf;
use thiserror::Error;

/// Result type for module resolution
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors raised by `require`
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Relative identifier used by a unit without a location
    #[error("cannot resolve '{id}': unit has no location")]
    NoLocation { id: String },

    /// Nothing found for the identifier
    #[error("module '{id}' not found from {base}")]
    NotFound { id: String, base: PathBuf },

    /// Failed to read a module file
    #[error("failed to read module {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a JSON module
    #[error("failed to parse JSON in {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to parse a YAML module
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised while loading units
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("unit '{0}' is already loaded")]
    DuplicateUnit(String),

    #[error("unit name must not be empty")]
    EmptyName,
}
