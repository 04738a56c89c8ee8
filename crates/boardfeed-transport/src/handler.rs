//! Request handler - answers poll requests from the update hub

use boardfeed_core::UpdateHub;
use boardfeed_protocol::{HealthStatus, HttpResponse, Request, Route};
use std::time::Instant;
use tracing::debug;

#[cfg(feature = "metrics")]
use crate::metrics::Metrics;
#[cfg(feature = "metrics")]
use std::sync::Arc;

/// Maps resolved routes onto the hub
pub struct RequestHandler {
    hub: UpdateHub,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<Metrics>>,
}

impl RequestHandler {
    pub fn new(hub: UpdateHub) -> Self {
        Self {
            hub,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Expose `/metrics` and record request counters
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn hub(&self) -> &UpdateHub {
        &self.hub
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    /// Answer one request; never fails, errors become HTTP statuses
    pub async fn handle(&self, request: &Request) -> HttpResponse {
        let started = Instant::now();

        let (label, response) = match Route::resolve(request) {
            Ok(route) => (route_label(&route), self.dispatch(route).await),
            Err(e) => ("unmatched", HttpResponse::from_error(&e)),
        };

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "Handled request"
        );
        self.record(label, response.status, started);

        response
    }

    async fn dispatch(&self, route: Route) -> HttpResponse {
        match route {
            Route::Updates { board, since } => {
                let batch = self.hub.updates(board, since).await;
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.events_served_total.inc_by(batch.events.len() as u64);
                }
                HttpResponse::batch(&batch)
            }
            Route::Snapshot { board } => match self.hub.snapshot(board).await {
                Some(snapshot) => HttpResponse::snapshot(&snapshot),
                None => HttpResponse::not_found(&format!("snapshot for board {}", board)),
            },
            Route::Health => HttpResponse::health(&HealthStatus::ok(self.hub.state().as_str())),
            Route::Metrics => self.metrics_response(),
        }
    }

    #[cfg(feature = "metrics")]
    fn metrics_response(&self) -> HttpResponse {
        match &self.metrics {
            Some(metrics) => {
                metrics.set_backend_state(self.hub.state());
                HttpResponse::new(200, "text/plain; version=0.0.4; charset=utf-8", metrics.export())
            }
            None => HttpResponse::not_found("/metrics"),
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn metrics_response(&self) -> HttpResponse {
        HttpResponse::not_found("/metrics")
    }

    #[cfg(feature = "metrics")]
    fn record(&self, label: &str, status: u16, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(label, status, started.elapsed().as_secs_f64());
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn record(&self, _label: &str, _status: u16, _started: Instant) {}
}

fn route_label(route: &Route) -> &'static str {
    match route {
        Route::Updates { .. } => "updates",
        Route::Snapshot { .. } => "snapshot",
        Route::Health => "health",
        Route::Metrics => "metrics",
    }
}
