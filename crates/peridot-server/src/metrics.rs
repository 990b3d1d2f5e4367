//! Process-wide Prometheus metrics for the dispatch pipeline.
//!
//! One [`Metrics`] instance is built at startup and shared (via `Arc`)
//! with the Sync Coordinator, Worker Pool, and the HTTP sidecar that
//! renders it on `/metrics`.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub active_connections: IntGauge,
    pub commit_conflicts_total: IntCounter,
    pub escalations_total: IntCounter,
    pub worker_queue_depth: IntGauge,
    pub sync_queue_depth: IntGauge,
    pub sync_tick_seconds: Histogram,
}

impl Metrics {
    /// Builds a fresh registry and registers every collector. Only fails if
    /// two collectors somehow share a fully-qualified name, which would be
    /// a programmer error.
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("peridot_requests_total", "Commands completed, by response status class"),
            &["status_class"],
        )
        .expect("static metric options are well-formed");
        let active_connections = IntGauge::new("peridot_active_connections", "Currently registered client sockets")
            .expect("static metric options are well-formed");
        let commit_conflicts_total = IntCounter::new(
            "peridot_commit_conflicts_total",
            "Optimistic-concurrency commit conflicts observed by workers",
        )
        .expect("static metric options are well-formed");
        let escalations_total = IntCounter::new(
            "peridot_escalations_total",
            "Commands handed from a worker to the Sync Coordinator",
        )
        .expect("static metric options are well-formed");
        let worker_queue_depth =
            IntGauge::new("peridot_worker_queue_depth", "Commands currently waiting in the Command Queue")
                .expect("static metric options are well-formed");
        let sync_queue_depth = IntGauge::new(
            "peridot_sync_queue_depth",
            "Commands currently waiting in the Sync Coordinator's queue",
        )
        .expect("static metric options are well-formed");
        let sync_tick_seconds = Histogram::with_opts(HistogramOpts::new(
            "peridot_sync_tick_seconds",
            "Wall-clock time spent in one Sync Coordinator tick",
        ))
        .expect("static metric options are well-formed");

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(active_connections.clone()),
            Box::new(commit_conflicts_total.clone()),
            Box::new(escalations_total.clone()),
            Box::new(worker_queue_depth.clone()),
            Box::new(sync_queue_depth.clone()),
            Box::new(sync_tick_seconds.clone()),
        ] {
            registry
                .register(collector)
                .expect("each collector above has a unique name");
        }

        Self {
            registry,
            requests_total,
            active_connections,
            commit_conflicts_total,
            escalations_total,
            worker_queue_depth,
            sync_queue_depth,
            sync_tick_seconds,
        }
    }

    pub fn observe_response(&self, status_code: u16) {
        let class = match status_code {
            200..=299 => "2xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "other",
        };
        self.requests_total.with_label_values(&[class]).inc();
    }

    /// Renders the current state of every collector in Prometheus text
    /// exposition format, for the HTTP sidecar's `/metrics` endpoint.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .expect("text encoding of gathered metric families never fails");
        String::from_utf8(buf).expect("Prometheus text encoder only emits UTF-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
