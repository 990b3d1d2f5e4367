//! The `peridot` node binary: parses layered configuration, wires up the
//! database and replication collaborators, and runs the dispatch pipeline
//! to completion.

use std::process::ExitCode;

use clap::Parser;
use peridot_config::{CliArgs, ConfigLoader};
use peridot_engine::mock::InMemoryExecutor;
use peridot_replication::mock::MockReplicationNode;
use peridot_server::PluginRegistry;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    let config = match ConfigLoader::new().load(args) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to assemble configuration");
            return ExitCode::FAILURE;
        }
    };

    let plugins = PluginRegistry::new();
    if let Err(err) = config.validate(&plugins.names()) {
        tracing::error!(error = %err, "invalid configuration");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        node = %config.node_name,
        server_host = %config.server_host,
        version = %config.advertised_version(),
        "starting node"
    );

    // The embedded database and the replication state machine are external
    // collaborators (see peridot-engine and peridot-replication); this
    // binary drives the dispatch pipeline against the in-process doubles
    // each crate ships, standing in for a real storage engine and a real
    // consensus implementation.
    let executor = InMemoryExecutor::new();
    let replication = MockReplicationNode::default();

    match peridot_server::run(&config, &executor, &replication, &plugins) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "node exited with an error");
            ExitCode::FAILURE
        }
    }
}
