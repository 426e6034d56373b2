//! Metrics collection and exposition.
//!
//! # Metrics
//! - `interceptor_requests_total` (counter): dispatch decisions by
//!   `category` (request, upgrade), `outcome` (claimed, chained, dropped)
//!   and `transport`
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter is optional, enabled from config

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::host::Category;

/// What the dispatcher did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Matched the base path, delivered to subscribers.
    Claimed,
    /// Forwarded to the handlers captured at install.
    Chained,
    /// Unclaimed with nothing behind the dispatcher.
    Dropped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Claimed => "claimed",
            Outcome::Chained => "chained",
            Outcome::Dropped => "dropped",
        }
    }
}

/// Install the Prometheus exporter, serving scrapes on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one dispatch decision.
pub fn record_dispatch(category: Category, outcome: Outcome, transport: &'static str) {
    metrics::counter!(
        "interceptor_requests_total",
        "category" => category.as_str(),
        "outcome" => outcome.as_str(),
        "transport" => transport
    )
    .increment(1);
}
