//! Configuration loading errors.

use thiserror::Error;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while assembling a [`crate::ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered `config` crate builder failed (bad TOML, bad env var type, ...).
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),

    /// A plugin name in `plugins` has no corresponding registration.
    ///
    /// Fatal at startup per the unknown-plugin-name error category: the
    /// process aborts rather than running with a silently-ignored plugin.
    #[error("unknown plugin {0:?}")]
    UnknownPlugin(String),

    /// `workerThreads` was explicitly set to zero.
    #[error("{0} must be at least 1")]
    ZeroThreads(&'static str),
}
