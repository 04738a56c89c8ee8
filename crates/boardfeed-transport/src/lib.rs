//! boardfeed transport layer
//!
//! Serves the polling protocol over plain HTTP/1.1:
//! - HTTP: one request per connection, JSON bodies
//! - Metrics: Prometheus counters fed by the publisher (optional feature)

pub mod error;
pub mod handler;
pub mod http;
#[cfg(feature = "metrics")]
pub mod metrics;

pub use error::TransportError;
pub use handler::RequestHandler;
pub use http::HttpServer;
#[cfg(feature = "metrics")]
pub use metrics::{Metrics, PublishMetrics};
