//! Errors produced while validating or loading configuration.

use std::path::PathBuf;

/// Errors that can occur while validating or loading a [`crate::ProxyConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A server name was empty.
    #[error("server name must not be empty")]
    EmptyServerName,

    /// A server name contained the reserved `__` separator.
    #[error("server name '{0}' must not contain '__', which is reserved as the tool name separator")]
    ReservedSeparator(String),

    /// Two servers were configured with the same name.
    #[error("duplicate server name '{0}'")]
    DuplicateServer(String),

    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file did not contain valid JSON, or failed validation.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path of the file that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}
