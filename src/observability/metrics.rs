//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_requests_total` (counter): outcomes by circuit and outcome
//! - `circuit_request_duration_seconds` (histogram): operation latency
//! - `circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `circuit_fallbacks_total` (counter): fallback runs by result
//!
//! # Design Decisions
//! - Labels are `name` and `group`, never the flat key
//! - Short-circuited calls are counted but not timed

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::registry::Identity;
use crate::resilience::state::CircuitState;
use crate::resilience::window::Outcome;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_outcome(circuit: &Identity, outcome: Outcome, latency: Duration) {
    metrics::counter!(
        "circuit_requests_total",
        "name" => circuit.name().to_string(),
        "group" => circuit.group().to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    if outcome != Outcome::ShortCircuited {
        metrics::histogram!(
            "circuit_request_duration_seconds",
            "name" => circuit.name().to_string(),
            "group" => circuit.group().to_string()
        )
        .record(latency.as_secs_f64());
    }
}

pub fn record_state(circuit: &Identity, state: CircuitState) {
    metrics::gauge!(
        "circuit_state",
        "name" => circuit.name().to_string(),
        "group" => circuit.group().to_string()
    )
    .set(state.as_gauge());
}

pub fn record_fallback(circuit: &Identity, succeeded: bool) {
    let result = if succeeded { "success" } else { "failure" };
    metrics::counter!(
        "circuit_fallbacks_total",
        "name" => circuit.name().to_string(),
        "group" => circuit.group().to_string(),
        "result" => result
    )
    .increment(1);
}
