//! # peridot-server: the dispatch pipeline
//!
//! Wires together the Command Queue, Router, Socket Registry, Worker
//! Pool, Sync Coordinator, Lifecycle Controller, and HTTP sidecar that
//! make up one node. The database engine ([`peridot_engine`]) and the
//! replication node ([`peridot_replication`]) are external collaborators
//! satisfying this crate's trait objects; neither is implemented here.

pub mod command;
pub mod connection;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod plugin;
pub mod queue;
pub mod registry;
pub mod reply;
pub mod router;
pub mod server;
pub mod status;
pub mod sync_coordinator;
pub mod worker;

pub use command::Command;
pub use error::{ServerError, ServerResult};
pub use lifecycle::LifecycleController;
pub use metrics::Metrics;
pub use plugin::{Plugin, PluginRegistry};
pub use queue::{CommandQueue, QueueError};
pub use server::run;
pub use sync_coordinator::SyncCoordinator;
pub use worker::Worker;
