//! Error types for configuration and host list loading.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading scenario config or the host list.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("no hosts defined in {0}")]
    NoHosts(String),

    #[error("invalid host entry on line {line}: {reason}")]
    InvalidHost { line: usize, reason: String },

    #[error("could not resolve host {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),
}
