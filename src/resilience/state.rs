//! Circuit state machine.
//!
//! # State Transitions
//! ```text
//! Closed → Open:      requests >= wait_threshold && success_ratio < threshold
//! Open → Half-Open:   circuit_duration elapsed (next call or monitor tick)
//! Half-Open → Closed: probe (call or health check) succeeds
//! Half-Open → Open:   probe call fails; open timer restarts
//! ```
//!
//! Pure and synchronous: callers pass `now` in and hold the breaker lock.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::resilience::window::WindowTotals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge value used by the metrics exporter.
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, reported so callers can log and export it outside the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Decision taken for an incoming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed; call runs and is counted normally.
    Pass,
    /// The single half-open trial call.
    Probe,
    /// Short-circuit to fallback or `Open` error.
    Reject,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    state: CircuitState,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            opened_at: None,
            probe_in_flight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn probe_in_flight(&self) -> bool {
        self.probe_in_flight
    }

    fn move_to(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        match to {
            CircuitState::Open => {
                self.opened_at = Some(now);
                self.probe_in_flight = false;
            }
            CircuitState::Closed => {
                self.opened_at = None;
                self.probe_in_flight = false;
            }
            CircuitState::HalfOpen => {}
        }
        Transition { from, to }
    }

    /// Open → Half-Open once `circuit_duration` has elapsed.
    pub fn poll_half_open(&mut self, now: Instant, circuit_duration: Duration) -> Option<Transition> {
        if self.state != CircuitState::Open {
            return None;
        }
        let opened_at = self.opened_at.unwrap_or(now);
        if now.saturating_duration_since(opened_at) >= circuit_duration {
            Some(self.move_to(CircuitState::HalfOpen, now))
        } else {
            None
        }
    }

    /// Claim the half-open probe slot.
    pub fn try_claim_probe(&mut self) -> bool {
        if self.state == CircuitState::HalfOpen && !self.probe_in_flight {
            self.probe_in_flight = true;
            true
        } else {
            false
        }
    }

    /// Give the probe slot back without a verdict.
    pub fn release_probe(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.probe_in_flight = false;
        }
    }

    /// Decide how to treat a call arriving at `now`.
    pub fn admit(&mut self, now: Instant, circuit_duration: Duration) -> (Admission, Option<Transition>) {
        let transition = self.poll_half_open(now, circuit_duration);
        let admission = match self.state() {
            CircuitState::Closed => Admission::Pass,
            CircuitState::Open => Admission::Reject,
            CircuitState::HalfOpen if self.try_claim_probe() => Admission::Probe,
            CircuitState::HalfOpen => Admission::Reject,
        };
        (admission, transition)
    }

    /// Trip when enough requests were seen and the success ratio fell too low.
    pub fn evaluate(
        &mut self,
        totals: &WindowTotals,
        threshold: f64,
        wait_threshold: u64,
        now: Instant,
    ) -> Option<Transition> {
        if self.state != CircuitState::Closed {
            return None;
        }
        if totals.requests() >= wait_threshold && totals.success_ratio() < threshold {
            Some(self.move_to(CircuitState::Open, now))
        } else {
            None
        }
    }

    /// Apply the verdict of the half-open probe.
    pub fn resolve_probe(&mut self, success: bool, now: Instant) -> Option<Transition> {
        if self.state != CircuitState::HalfOpen {
            return None;
        }
        let to = if success { CircuitState::Closed } else { CircuitState::Open };
        Some(self.move_to(to, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DURATION: Duration = Duration::from_millis(30_000);

    fn failing_totals() -> WindowTotals {
        WindowTotals {
            successes: 2,
            failures: 3,
            timeouts: 0,
            short_circuited: 0,
        }
    }

    #[test]
    fn test_trips_only_past_wait_threshold() {
        let now = Instant::now();
        let mut machine = StateMachine::new();

        let few = WindowTotals { successes: 0, failures: 4, timeouts: 0, short_circuited: 0 };
        assert_eq!(machine.evaluate(&few, 0.6, 5, now), None);
        assert_eq!(machine.state(), CircuitState::Closed);

        let t = machine.evaluate(&failing_totals(), 0.6, 5, now).unwrap();
        assert_eq!(t, Transition { from: CircuitState::Closed, to: CircuitState::Open });
        assert_eq!(machine.opened_at(), Some(now));
    }

    #[test]
    fn test_ratio_at_threshold_stays_closed() {
        let mut machine = StateMachine::new();
        let totals = WindowTotals { successes: 3, failures: 2, timeouts: 0, short_circuited: 0 };
        assert_eq!(machine.evaluate(&totals, 0.6, 5, Instant::now()), None);
    }

    #[test]
    fn test_open_rejects_until_duration_elapses() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new();
        machine.evaluate(&failing_totals(), 0.6, 5, t0);

        let (admission, transition) = machine.admit(t0 + Duration::from_millis(29_999), DURATION);
        assert_eq!(admission, Admission::Reject);
        assert!(transition.is_none());

        let (admission, transition) = machine.admit(t0 + Duration::from_millis(30_001), DURATION);
        assert_eq!(admission, Admission::Probe);
        assert_eq!(transition.map(|t| t.to), Some(CircuitState::HalfOpen));
    }

    #[test]
    fn test_single_probe_admitted() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new();
        machine.evaluate(&failing_totals(), 0.6, 5, t0);
        let later = t0 + DURATION;

        assert_eq!(machine.admit(later, DURATION).0, Admission::Probe);
        assert_eq!(machine.admit(later, DURATION).0, Admission::Reject);

        machine.release_probe();
        assert_eq!(machine.admit(later, DURATION).0, Admission::Probe);
    }

    #[test]
    fn test_probe_verdicts() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new();
        machine.evaluate(&failing_totals(), 0.6, 5, t0);

        let t1 = t0 + DURATION;
        machine.admit(t1, DURATION);
        let reopened = machine.resolve_probe(false, t1).unwrap();
        assert_eq!(reopened.to, CircuitState::Open);
        assert_eq!(machine.opened_at(), Some(t1));
        // Timer restarted from t1.
        assert_eq!(machine.admit(t1 + Duration::from_millis(29_999), DURATION).0, Admission::Reject);

        let t2 = t1 + DURATION;
        assert_eq!(machine.admit(t2, DURATION).0, Admission::Probe);
        let closed = machine.resolve_probe(true, t2).unwrap();
        assert_eq!(closed.to, CircuitState::Closed);
        assert!(!machine.probe_in_flight());
        assert_eq!(machine.admit(t2, DURATION).0, Admission::Pass);
    }
}
