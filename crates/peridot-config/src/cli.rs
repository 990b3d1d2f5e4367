//! Command-line flags, the highest-precedence configuration layer.

use std::path::PathBuf;

use clap::Parser;

/// Overrides for [`crate::ServerConfig`] fields. Unset flags leave the
/// layered TOML/env/default value untouched.
#[derive(Debug, Parser, Default)]
#[command(name = "peridot", about = "A clustered, replicated command-processing node")]
pub struct CliArgs {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the database file.
    #[arg(long = "db")]
    pub db: Option<PathBuf>,

    /// Database cache size, in pages.
    #[arg(long = "cache-size")]
    pub cache_size: Option<u64>,

    /// Maximum size of the write-ahead journal, in bytes.
    #[arg(long = "max-journal-size")]
    pub max_journal_size: Option<u64>,

    /// Number of worker threads.
    #[arg(long = "worker-threads")]
    pub worker_threads: Option<usize>,

    /// Legacy alias for `--worker-threads`, kept for operators migrating
    /// existing start scripts. Ignored when `--worker-threads` is also set.
    #[arg(long = "read-threads")]
    pub read_threads: Option<usize>,

    /// This node's name.
    #[arg(long = "node-name")]
    pub node_name: Option<String>,

    /// This node's replication-layer host:port.
    #[arg(long = "node-host")]
    pub node_host: Option<String>,

    /// Comma-separated addresses of the other nodes in the cluster.
    #[arg(long = "peer-list", value_delimiter = ',')]
    pub peer_list: Option<Vec<String>>,

    /// This node's priority in leader election.
    #[arg(long)]
    pub priority: Option<u32>,

    /// Replication-layer quorum checkpoint parameter.
    #[arg(long = "quorum-checkpoint")]
    pub quorum_checkpoint: Option<u32>,

    /// Address to bind the client command port.
    #[arg(long = "server-host")]
    pub server_host: Option<String>,

    /// Comma-separated plugin names to enable.
    #[arg(long, value_delimiter = ',')]
    pub plugins: Option<Vec<String>>,

    /// Overrides the advertised node version.
    #[arg(long = "version-override")]
    pub version_override: Option<String>,

    /// Path for query logging.
    #[arg(long = "query-log")]
    pub query_log: Option<PathBuf>,
}

impl CliArgs {
    /// Applies the flags that were actually supplied onto `cfg`.
    pub fn apply(self, cfg: &mut crate::ServerConfig) {
        if let Some(v) = self.db {
            cfg.db = v;
        }
        if let Some(v) = self.cache_size {
            cfg.cache_size = v;
        }
        if let Some(v) = self.max_journal_size {
            cfg.max_journal_size = v;
        }
        match (self.worker_threads, self.read_threads) {
            (Some(v), _) => cfg.worker_threads = v,
            (None, Some(v)) => cfg.worker_threads = v,
            (None, None) => {}
        }
        if let Some(v) = self.node_name {
            cfg.node_name = v;
        }
        if let Some(v) = self.node_host {
            cfg.node_host = v;
        }
        if let Some(v) = self.peer_list {
            cfg.peer_list = v;
        }
        if let Some(v) = self.priority {
            cfg.priority = v;
        }
        if let Some(v) = self.quorum_checkpoint {
            cfg.quorum_checkpoint = v;
        }
        if let Some(v) = self.server_host {
            cfg.server_host = v;
        }
        if let Some(v) = self.plugins {
            cfg.plugins = v;
        }
        if self.version_override.is_some() {
            cfg.version_override = self.version_override;
        }
        if let Some(v) = self.query_log {
            cfg.query_log = Some(v);
        }
    }
}
