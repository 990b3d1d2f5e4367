//! Assembly: the `mio::Poll` event loop that ties the Router, Socket
//! Registry, Sync Coordinator, Worker Pool, Lifecycle Controller, and HTTP
//! sidecar together into one running node.
//!
//! This is the only place that owns the listening sockets and drains the
//! reply channel into the registry, resolving the worker-touches-socket
//! hazard: everything here runs on a single thread.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use peridot_config::ServerConfig;
use peridot_engine::CommandExecutor;
use peridot_replication::ReplicationControl;
use peridot_types::{ClientId, Timestamp};
use peridot_wire::Response;

use crate::connection::Connection;
use crate::error::{ServerError, ServerResult};
use crate::http::HttpSidecar;
use crate::lifecycle::{LifecycleController, PortState};
use crate::metrics::Metrics;
use crate::plugin::PluginRegistry;
use crate::queue::CommandQueue;
use crate::registry::SocketRegistry;
use crate::reply;
use crate::router::Router;
use crate::sync_coordinator::SyncCoordinator;
use crate::worker::Worker;

const LISTENER_TOKEN: Token = Token(0);
#[cfg(unix)]
const SIGNAL_TOKEN: Token = Token(1);
const CLIENT_TOKEN_OFFSET: usize = 2;
const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Runs a node to completion: binds the command and HTTP ports, spawns the
/// worker pool, and drives the Sync Coordinator's event loop until
/// graceful shutdown finishes.
pub fn run(
    config: &ServerConfig,
    executor: &dyn CommandExecutor,
    replication: &dyn ReplicationControl,
    plugins: &PluginRegistry,
) -> ServerResult<()> {
    let metrics = Metrics::new();
    let lifecycle = LifecycleController::new(config.query_log.clone());
    let queue = CommandQueue::new();
    let sync_queue = CommandQueue::new();
    let (reply_tx, reply_rx) = reply::channel();
    let mut registry = SocketRegistry::new();
    let router = Router::new();
    let sync_coordinator = SyncCoordinator::new(
        &queue,
        &sync_queue,
        executor,
        replication,
        reply_tx.clone(),
        &metrics,
    );
    let shutdown = AtomicBool::new(false);

    let mut poll = Poll::new()?;
    let command_addr = bind_addr(&config.server_host)?;
    let mut listener: Option<TcpListener> = None;

    #[cfg(unix)]
    let mut signals = register_signals(&poll)?;

    let http_addr = SocketAddr::from_str("0.0.0.0:9090").expect("constant address is valid");
    let http_sidecar = HttpSidecar::bind(http_addr, &poll)?;

    let mut events = Events::with_capacity(1024);

    thread::scope(|scope| {
        for index in 0..config.worker_threads {
            let worker = Worker {
                index,
                queue: &queue,
                sync_queue: &sync_queue,
                executor,
                reply: reply_tx.clone(),
                metrics: &metrics,
            };
            let shutdown = &shutdown;
            scope.spawn(move || worker.run(shutdown));
        }
        drop(reply_tx);

        loop {
            let live_role = replication.role();
            let role = lifecycle
                .reconcile_stuck_role(replication, live_role)
                .unwrap_or(live_role);
            if role != live_role {
                tracing::warn!(live = %live_role, forced = %role, "forced cached role down to unblock shutdown");
            }

            reconcile_listener(&mut listener, &poll, command_addr, &lifecycle, role, config.advertised_version(), &replication.leader_version())?;

            poll.poll(&mut events, Some(POLL_TIMEOUT))?;

            for event in &events {
                match event.token() {
                    LISTENER_TOKEN => {
                        if let Some(listener) = &listener {
                            accept_connections(listener, &mut registry, &poll, &metrics)?;
                        }
                    }
                    #[cfg(unix)]
                    SIGNAL_TOKEN => {
                        for signal in signals.pending() {
                            let effect = lifecycle.handle_signal(signal);
                            tracing::info!(signal, ?effect, "operator signal handled");
                        }
                    }
                    t if t == crate::http::HTTP_LISTENER_TOKEN => {
                        http_sidecar.handle_accept(&metrics, || {
                            role.accepts_commands() && !lifecycle.is_shutdown_requested()
                        });
                    }
                    token => service_connection(token, &mut registry, &queue, &metrics, role, config.advertised_version(), &replication.leader_version(), plugins, &router)?,
                }
            }

            sync_coordinator.tick();
            drain_replies(&reply_rx, &mut registry, &metrics);

            if lifecycle.graceful_shutdown_complete(role, queue.is_empty() && sync_queue.is_empty()) {
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
        }

        Ok::<(), ServerError>(())
    })?;

    tracing::info!("node shut down cleanly");
    Ok(())
}

fn bind_addr(server_host: &str) -> ServerResult<SocketAddr> {
    SocketAddr::from_str(server_host).map_err(|_| ServerError::BindFailed {
        addr: server_host.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "unparseable server_host"),
    })
}

#[cfg(unix)]
fn register_signals(poll: &Poll) -> ServerResult<signal_hook_mio::v1_0::Signals> {
    use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM, SIGTTIN, SIGTTOU, SIGUSR2};

    let mut signals = signal_hook_mio::v1_0::Signals::new([SIGINT, SIGTERM, SIGTTIN, SIGTTOU, SIGUSR2, SIGQUIT])
        .map_err(ServerError::SignalSetup)?;
    poll.registry()
        .register(&mut signals, SIGNAL_TOKEN, Interest::READABLE)?;
    Ok(signals)
}

/// Opens or closes the command listener to match the Lifecycle
/// Controller's decision for this tick.
fn reconcile_listener(
    listener: &mut Option<TcpListener>,
    poll: &Poll,
    addr: SocketAddr,
    lifecycle: &LifecycleController,
    role: peridot_types::ReplicaRole,
    our_version: &str,
    leader_version: &str,
) -> ServerResult<()> {
    match (lifecycle.port_state(role, our_version, leader_version), listener.is_some()) {
        (PortState::Open, false) => {
            let mut bound = TcpListener::bind(addr).map_err(|source| ServerError::BindFailed {
                addr: addr.to_string(),
                source,
            })?;
            poll.registry().register(&mut bound, LISTENER_TOKEN, Interest::READABLE)?;
            tracing::info!(%addr, "command port opened");
            *listener = Some(bound);
        }
        (PortState::Closed, true) => {
            let mut bound = listener.take().expect("checked by match guard");
            poll.registry().deregister(&mut bound)?;
            tracing::info!(%addr, "command port closed");
        }
        _ => {}
    }
    Ok(())
}

fn accept_connections(
    listener: &TcpListener,
    registry: &mut SocketRegistry,
    poll: &Poll,
    metrics: &Metrics,
) -> ServerResult<()> {
    loop {
        match listener.accept() {
            Ok((mut stream, addr)) => {
                let id = registry.next_id();
                poll.registry()
                    .register(&mut stream, Token(CLIENT_TOKEN_OFFSET + u64::from(id) as usize), Interest::READABLE)?;
                tracing::debug!(client = %id, %addr, "accepted connection");
                registry.insert(Connection::new(id, stream));
                metrics.active_connections.inc();
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn service_connection(
    token: Token,
    registry: &mut SocketRegistry,
    queue: &CommandQueue,
    metrics: &Metrics,
    role: peridot_types::ReplicaRole,
    our_version: &str,
    leader_version: &str,
    plugins: &PluginRegistry,
    router: &Router,
) -> ServerResult<()> {
    let Some(id) = token.0.checked_sub(CLIENT_TOKEN_OFFSET).map(|n| ClientId::from(n as u64)) else {
        return Ok(());
    };
    let Some(conn) = registry.get_mut(id) else {
        return Ok(());
    };

    let closed = conn.read()?;
    router.poll_connection(conn, queue, Timestamp::now(), role, our_version, leader_version, plugins)?;
    conn.flush_writes()?;

    if closed && !conn.has_pending_writes() {
        registry.remove(id);
        metrics.active_connections.dec();
    }
    Ok(())
}

fn drain_replies(reply_rx: &reply::ReplyReceiver, registry: &mut SocketRegistry, metrics: &Metrics) {
    for local_reply in reply_rx.drain() {
        if let Some(conn) = registry.get_mut(local_reply.client) {
            metrics.observe_response(leading_status_code(&local_reply.response));
            conn.queue_response(&local_reply.response);
            conn.mark_replied();
            let _ = conn.flush_writes();
        }
    }
}

fn leading_status_code(response: &Response) -> u16 {
    response
        .method_line
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}
