//! Prometheus metrics for boardfeed
//!
//! Covers the poll server and, when the process also publishes, the publish
//! path. The publisher never reports failures to its caller, so the
//! `boardfeed_publish_failures_total` counter is where dropped events show up.
//! A daemon that only serves polls leaves the publish counters unregistered.

use boardfeed_core::{BoardId, Envelope, Error, PublishObserver};
use boardfeed_storage::ConnectionState;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::error;

/// boardfeed metrics collector
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // Poll server
    pub connections_total: IntCounter,
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
    pub events_served_total: IntCounter,

    // Backing store
    pub backend_state: IntGauge,

    publish: Option<PublishMetrics>,
}

/// Counters fed by an [`UpdatePublisher`](boardfeed_core::UpdatePublisher) observing through [`Metrics`]
#[derive(Clone)]
pub struct PublishMetrics {
    pub events_published_total: IntCounter,
    pub snapshots_published_total: IntCounter,
    pub publish_failures_total: IntCounterVec,
}

impl Metrics {
    /// Create a collector for the poll server
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let connections_total = IntCounter::new("boardfeed_connections_total", "Total HTTP connections accepted")?;

        let requests_total = IntCounterVec::new(
            Opts::new("boardfeed_requests_total", "Total HTTP requests answered"),
            &["route", "status"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("boardfeed_request_duration_seconds", "Request processing duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0]),
            &["route"],
        )?;

        let events_served_total = IntCounter::new("boardfeed_events_served_total", "Total envelopes returned to pollers")?;

        let backend_state = IntGauge::new(
            "boardfeed_backend_state",
            "Backing store state (0 uninitialized, 1 connected, 2 failed)",
        )?;

        registry.register(Box::new(connections_total.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(events_served_total.clone()))?;
        registry.register(Box::new(backend_state.clone()))?;

        Ok(Self {
            registry,
            connections_total,
            requests_total,
            request_duration_seconds,
            events_served_total,
            backend_state,
            publish: None,
        })
    }

    /// Also register the publish-path counters; use when this collector is
    /// handed to a publisher as its observer
    pub fn with_publish_metrics(mut self) -> prometheus::Result<Self> {
        if self.publish.is_some() {
            return Ok(self);
        }

        let events_published_total =
            IntCounter::new("boardfeed_events_published_total", "Total envelopes recorded by the publisher")?;

        let snapshots_published_total = IntCounter::new(
            "boardfeed_snapshots_published_total",
            "Total envelopes recorded with a board snapshot",
        )?;

        let publish_failures_total = IntCounterVec::new(
            Opts::new("boardfeed_publish_failures_total", "Total events dropped by the publisher"),
            &["error_type"],
        )?;

        self.registry.register(Box::new(events_published_total.clone()))?;
        self.registry.register(Box::new(snapshots_published_total.clone()))?;
        self.registry.register(Box::new(publish_failures_total.clone()))?;

        self.publish = Some(PublishMetrics {
            events_published_total,
            snapshots_published_total,
            publish_failures_total,
        });
        Ok(self)
    }

    pub fn publish(&self) -> Option<&PublishMetrics> {
        self.publish.as_ref()
    }

    /// Record an answered request
    pub fn record_request(&self, route: &str, status: u16, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[route])
            .observe(duration_secs);
    }

    pub fn set_backend_state(&self, state: ConnectionState) {
        self.backend_state.set(match state {
            ConnectionState::Uninitialized => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Failed => 2,
        });
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl PublishObserver for Metrics {
    fn recorded(&self, envelope: &Envelope) {
        let Some(publish) = &self.publish else { return };
        publish.events_published_total.inc();
        if envelope.snapshot.is_some() {
            publish.snapshots_published_total.inc();
        }
    }

    fn failed(&self, _board: BoardId, _event: &str, error: &Error) {
        if let Some(publish) = &self.publish {
            publish.publish_failures_total.with_label_values(&[error.kind()]).inc();
        }
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
