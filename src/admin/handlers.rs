use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::registry::Identity;
use crate::resilience::state::CircuitState;
use crate::stats::Snapshot;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub circuits: usize,
    pub open: usize,
    pub half_open: usize,
    pub stream_subscribers: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let circuits = state.registry.circuits();
    let count = |wanted: CircuitState| circuits.iter().filter(|c| c.state() == wanted).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        circuits: circuits.len(),
        open: count(CircuitState::Open),
        half_open: count(CircuitState::HalfOpen),
        stream_subscribers: state.registry.hub().subscriber_count(),
    })
}

pub async fn get_circuits(State(state): State<AppState>) -> Json<BTreeMap<String, BTreeMap<String, Snapshot>>> {
    let grouped = state
        .registry
        .by_group()
        .into_iter()
        .map(|(group, circuits)| {
            let snapshots = circuits
                .into_iter()
                .map(|(name, circuit)| (name, circuit.snapshot()))
                .collect();
            (group, snapshots)
        })
        .collect();
    Json(grouped)
}

pub async fn get_circuit(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Json<Snapshot>, StatusCode> {
    state
        .registry
        .find(&Identity::new(name, group))
        .map(|circuit| Json(circuit.snapshot()))
        .ok_or(StatusCode::NOT_FOUND)
}
