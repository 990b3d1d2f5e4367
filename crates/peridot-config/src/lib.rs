//! # peridot-config: layered server configuration
//!
//! [`ServerConfig`] covers every option in the dispatch pipeline's
//! configuration surface. Values are assembled, lowest to highest
//! precedence, by [`loader::ConfigLoader`]: built-in defaults, an optional
//! TOML file, `PERIDOT_`-prefixed environment variables, then CLI flags.

pub mod cli;
pub mod error;
pub mod loader;

pub use cli::CliArgs;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything the dispatch pipeline needs to start a node.
///
/// Field names deserialize in `camelCase` to match the option names used in
/// TOML files and documentation (`cacheSize`, `workerThreads`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Path to the database file.
    pub db: PathBuf,
    /// Database cache size, in pages.
    pub cache_size: u64,
    /// Maximum size of the write-ahead journal, in bytes.
    pub max_journal_size: u64,
    /// Number of worker threads. Defaults to hardware parallelism.
    ///
    /// `readThreads`/`--read-threads` is accepted as a legacy alias for this
    /// same value (see [`crate::cli::CliArgs::apply`]), not an independent
    /// pool size; there is only ever one worker thread count.
    pub worker_threads: usize,
    /// This node's name, used in replication identity and logs.
    pub node_name: String,
    /// This node's replication-layer host:port, advertised to peers.
    pub node_host: String,
    /// Addresses of the other nodes in the cluster.
    pub peer_list: Vec<String>,
    /// This node's priority in leader election; higher wins ties.
    pub priority: u32,
    /// Replication-layer quorum checkpoint parameter.
    pub quorum_checkpoint: u32,
    /// Address to bind the client command port.
    pub server_host: String,
    /// Names of plugins to enable; every name must be registered at start.
    pub plugins: Vec<String>,
    /// Overrides the advertised node version (for version-skew testing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_override: Option<String>,
    /// This node's real version string.
    pub version: String,
    /// Path for query logging; toggled at runtime by SIGUSR2/SIGQUIT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);
        Self {
            db: PathBuf::from("peridot.db"),
            cache_size: 2000,
            max_journal_size: 1 << 30,
            worker_threads: parallelism,
            node_name: "peridot".to_string(),
            node_host: "localhost:9999".to_string(),
            peer_list: Vec::new(),
            priority: 0,
            quorum_checkpoint: 5000,
            server_host: "0.0.0.0:8888".to_string(),
            plugins: Vec::new(),
            version_override: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            query_log: None,
        }
    }
}

impl ServerConfig {
    /// The version to advertise for version-skew suppression: the override
    /// if set, otherwise the real version.
    pub fn advertised_version(&self) -> &str {
        self.version_override.as_deref().unwrap_or(&self.version)
    }

    /// Validates invariants that can't be expressed in the type alone.
    ///
    /// Checked separately from deserialization so callers can distinguish
    /// a malformed file (`ConfigError::Build`) from a well-formed but
    /// invalid configuration (e.g. an unregistered plugin name).
    pub fn validate(&self, registered_plugins: &[&str]) -> ConfigResult<()> {
        if self.worker_threads == 0 {
            return Err(ConfigError::ZeroThreads("workerThreads"));
        }
        for plugin in &self.plugins {
            if !registered_plugins.contains(&plugin.as_str()) {
                return Err(ConfigError::UnknownPlugin(plugin.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = ServerConfig::default();
        assert!(cfg.validate(&[]).is_ok());
        assert_eq!(cfg.advertised_version(), cfg.version);
    }

    #[test]
    fn version_override_takes_precedence() {
        let mut cfg = ServerConfig::default();
        cfg.version_override = Some("9.9.9".to_string());
        assert_eq!(cfg.advertised_version(), "9.9.9");
    }

    #[test]
    fn unregistered_plugin_is_rejected() {
        let mut cfg = ServerConfig::default();
        cfg.plugins = vec!["nonexistent".to_string()];
        assert!(matches!(
            cfg.validate(&["status"]),
            Err(ConfigError::UnknownPlugin(_))
        ));
    }

    #[test]
    fn zero_worker_threads_is_rejected() {
        let mut cfg = ServerConfig::default();
        cfg.worker_threads = 0;
        assert!(matches!(cfg.validate(&[]), Err(ConfigError::ZeroThreads(_))));
    }
}
