//! Hystrix dashboard record format.
//!
//! Each snapshot becomes one `HystrixCommand` JSON object, written to the
//! stream as an SSE `data:` line.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::resilience::state::CircuitState;
use crate::stats::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HystrixCommand {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub group: String,
    pub current_time: u64,
    pub is_circuit_breaker_open: bool,
    pub error_percentage: f64,
    pub error_count: u64,
    pub request_count: u64,
    pub rolling_count_success: u64,
    pub rolling_count_failure: u64,
    pub rolling_count_timeout: u64,
    pub rolling_count_short_circuited: u64,
    pub current_concurrent_execution_count: usize,
    #[serde(rename = "latencyExecute_mean")]
    pub latency_execute_mean: f64,
    pub latency_execute: BTreeMap<String, u64>,
    #[serde(rename = "latencyTotal_mean")]
    pub latency_total_mean: f64,
    pub latency_total: BTreeMap<String, u64>,
    #[serde(rename = "propertyValue_circuitBreakerRequestVolumeThreshold")]
    pub request_volume_threshold: u64,
    #[serde(rename = "propertyValue_circuitBreakerErrorThresholdPercentage")]
    pub error_threshold_percentage: f64,
    #[serde(rename = "propertyValue_circuitBreakerSleepWindowInMilliseconds")]
    pub sleep_window_ms: u64,
    #[serde(rename = "propertyValue_executionIsolationThreadTimeoutInMilliseconds")]
    pub timeout_ms: u64,
    #[serde(rename = "propertyValue_metricsRollingStatisticalWindowInMilliseconds")]
    pub rolling_window_ms: u64,
    pub reporting_hosts: u32,
    pub circuit_state: CircuitState,
    pub success_ratio: f64,
}

/// Dashboard label for a percentile level: `0.995` → `"99.5"`, `0.5` → `"50"`.
pub fn percentile_label(p: f64) -> String {
    let value = (p * 1000.0).round() / 10.0;
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

impl From<&Snapshot> for HystrixCommand {
    fn from(s: &Snapshot) -> Self {
        let latency: BTreeMap<String, u64> = s
            .latency
            .percentiles
            .iter()
            .map(|(p, ms)| (percentile_label(*p), *ms))
            .collect();

        Self {
            kind: "HystrixCommand",
            name: s.name.clone(),
            group: s.group.clone(),
            current_time: s.taken_at_ms,
            is_circuit_breaker_open: s.state != CircuitState::Closed,
            error_percentage: s.error_percentage,
            error_count: s.totals.errors(),
            request_count: s.totals.requests(),
            rolling_count_success: s.totals.successes,
            rolling_count_failure: s.totals.failures,
            rolling_count_timeout: s.totals.timeouts,
            rolling_count_short_circuited: s.totals.short_circuited,
            current_concurrent_execution_count: s.concurrent,
            latency_execute_mean: s.latency.mean_ms,
            latency_total_mean: s.latency.mean_ms,
            latency_total: latency.clone(),
            latency_execute: latency,
            request_volume_threshold: s.settings.wait_threshold,
            error_threshold_percentage: ((1.0 - s.settings.threshold) * 100.0).round(),
            sleep_window_ms: s.settings.circuit_duration_ms,
            timeout_ms: s.settings.timeout_ms,
            rolling_window_ms: s.settings.window_ms,
            reporting_hosts: 1,
            circuit_state: s.state,
            success_ratio: s.success_ratio,
        }
    }
}

/// One SSE frame: `data: {json}\n\n`.
pub fn sse_frame(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(&HystrixCommand::from(snapshot))?;
    Ok(format!("data: {}\n\n", json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::settings::BreakerSettings;
    use crate::resilience::window::{LatencySummary, WindowTotals};

    fn snapshot() -> Snapshot {
        Snapshot {
            name: "get-user".to_string(),
            group: "users".to_string(),
            state: CircuitState::Open,
            taken_at_ms: 1_700_000_000_000,
            totals: WindowTotals {
                successes: 2,
                failures: 2,
                timeouts: 1,
                short_circuited: 4,
            },
            success_ratio: 0.4,
            error_percentage: 60.0,
            concurrent: 1,
            latency: LatencySummary {
                mean_ms: 12.5,
                percentiles: vec![(0.5, 10), (0.995, 40), (1.0, 41)],
            },
            settings: (&BreakerSettings::default()).into(),
        }
    }

    #[test]
    fn test_percentile_labels() {
        assert_eq!(percentile_label(0.0), "0");
        assert_eq!(percentile_label(0.25), "25");
        assert_eq!(percentile_label(0.995), "99.5");
        assert_eq!(percentile_label(1.0), "100");
    }

    #[test]
    fn test_record_shape() {
        let value = serde_json::to_value(HystrixCommand::from(&snapshot())).unwrap();

        assert_eq!(value["type"], "HystrixCommand");
        assert_eq!(value["name"], "get-user");
        assert_eq!(value["group"], "users");
        assert_eq!(value["isCircuitBreakerOpen"], true);
        assert_eq!(value["circuitState"], "OPEN");
        assert_eq!(value["errorCount"], 3);
        assert_eq!(value["requestCount"], 5);
        assert_eq!(value["rollingCountShortCircuited"], 4);
        assert_eq!(value["currentConcurrentExecutionCount"], 1);
        assert_eq!(value["latencyExecute_mean"], 12.5);
        assert_eq!(value["latencyExecute"]["99.5"], 40);
        assert_eq!(value["latencyTotal"]["100"], 41);
        assert_eq!(value["propertyValue_circuitBreakerRequestVolumeThreshold"], 100);
        assert_eq!(value["propertyValue_circuitBreakerErrorThresholdPercentage"], 40.0);
        assert_eq!(value["propertyValue_circuitBreakerSleepWindowInMilliseconds"], 30_000);
        assert_eq!(value["reportingHosts"], 1);
    }

    #[test]
    fn test_sse_frame() {
        let frame = sse_frame(&snapshot()).unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
    }
}
