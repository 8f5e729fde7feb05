//! Statistics events published by breakers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::resilience::settings::BreakerSettings;
use crate::resilience::state::CircuitState;
use crate::resilience::window::{LatencySummary, Outcome, WindowTotals};

/// One recorded call.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeEvent {
    pub name: String,
    pub group: String,
    /// State after the outcome was applied.
    pub state: CircuitState,
    pub outcome: Outcome,
    pub latency_ms: u64,
}

/// Settings echoed in every snapshot so dashboards can show them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSettings {
    pub threshold: f64,
    pub wait_threshold: u64,
    pub timeout_ms: u64,
    pub circuit_duration_ms: u64,
    pub window_ms: u64,
}

impl From<&BreakerSettings> for SnapshotSettings {
    fn from(s: &BreakerSettings) -> Self {
        Self {
            threshold: s.threshold,
            wait_threshold: s.wait_threshold,
            timeout_ms: s.timeout.as_millis() as u64,
            circuit_duration_ms: s.circuit_duration.as_millis() as u64,
            window_ms: s.window().as_millis() as u64,
        }
    }
}

/// Consistent view of a breaker, taken under its lock.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub name: String,
    pub group: String,
    pub state: CircuitState,
    /// Wall-clock time the snapshot was taken, in ms since the Unix epoch.
    pub taken_at_ms: u64,
    pub totals: WindowTotals,
    pub success_ratio: f64,
    pub error_percentage: f64,
    /// Calls currently executing.
    pub concurrent: usize,
    pub latency: LatencySummary,
    pub settings: SnapshotSettings,
}

impl Snapshot {
    pub fn requests(&self) -> u64 {
        self.totals.requests()
    }
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Everything travelling over the stats hub.
#[derive(Debug, Clone)]
pub enum StatsEvent {
    Outcome(OutcomeEvent),
    Snapshot(Snapshot),
}
