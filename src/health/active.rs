//! Active health checking for open circuits.
//!
//! # Responsibilities
//! - Move an open circuit to half-open once its duration has elapsed, even
//!   when no traffic arrives
//! - Run the breaker's health check as the half-open probe
//! - Close the circuit when the check passes
//!
//! One monitor runs per tripped breaker. It holds only a weak handle and exits
//! when the circuit closes, the health check is removed, or the breaker is
//! dropped.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::resilience::circuit_breaker::WeakBreaker;

/// Verdict of one monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HealthCycle {
    Continue,
    Stop,
}

pub(crate) struct HealthMonitor<A, T, E> {
    breaker: WeakBreaker<A, T, E>,
    interval: Duration,
}

impl<A, T, E> HealthMonitor<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(breaker: WeakBreaker<A, T, E>, interval: Duration) -> Self {
        Self { breaker, interval }
    }

    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(breaker) = self.breaker.upgrade() else {
                tracing::debug!("Breaker dropped, health monitor exiting");
                break;
            };
            if breaker.health_cycle().await == HealthCycle::Stop {
                tracing::debug!(circuit = %breaker.identity(), "Health monitor exiting");
                break;
            }
        }
    }
}
