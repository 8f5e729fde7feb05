//! Circuit breaker around an async operation.
//!
//! # Call Path
//! ```text
//! execute(args)
//!     → admit (lock: Open→Half-Open check, probe claim)
//!         Reject → record short-circuit → fallback | Open
//!     → run(args) raced against `timeout` (no lock held)
//!     → complete (lock: record in window, evaluate or resolve probe)
//!     → publish OutcomeEvent (fire-and-forget)
//!     → value | fallback | Timeout | Operation(err)
//! ```
//!
//! # Design Decisions
//! - One mutex per breaker guards the state machine and the window; it is never
//!   held across an await, so operation bodies run fully concurrently
//! - Snapshots copy counters and latency samples under the lock; sorting and
//!   percentile math happen after it is released
//! - A timed-out operation future is dropped. Work it spawned elsewhere may
//!   still finish, but its result can no longer be recorded
//! - Callbacks live behind `ArcSwap`; replacing them never touches statistics

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::{self, Instant};

use crate::error::{BreakerError, RegistrationError};
use crate::health::active::{HealthCycle, HealthMonitor};
use crate::observability::metrics;
use crate::registry::Identity;
use crate::resilience::operation::Callbacks;
use crate::resilience::settings::BreakerSettings;
use crate::resilience::state::{Admission, CircuitState, StateMachine, Transition};
use crate::resilience::window::{LatencySamples, Outcome, RollingWindow, WindowTotals};
use crate::stats::snapshot::{unix_millis, OutcomeEvent, Snapshot};
use crate::stats::{StatsEvent, StatsHub};

/// Registry-facing view of a breaker, independent of its operation signature.
pub trait Circuit: Send + Sync {
    fn identity(&self) -> &Identity;
    fn state(&self) -> CircuitState;
    fn snapshot(&self) -> Snapshot;
    /// A snapshot if `stat_interval` has passed since the last one handed out.
    fn take_due_snapshot(&self) -> Option<Snapshot>;
    fn as_any(&self) -> &dyn Any;
}

struct Core {
    machine: StateMachine,
    window: RollingWindow,
    last_snapshot: Option<Instant>,
    monitor_running: bool,
}

struct Captured {
    state: CircuitState,
    totals: WindowTotals,
    latencies: LatencySamples,
}

fn lock(core: &Mutex<Core>) -> MutexGuard<'_, Core> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared<A, T, E> {
    identity: Identity,
    settings: BreakerSettings,
    callbacks: ArcSwap<Callbacks<A, T, E>>,
    core: Mutex<Core>,
    concurrent: AtomicUsize,
    hub: StatsHub,
}

/// Releases the half-open probe slot if the probing call never reports back.
struct ProbeGuard<'a> {
    core: &'a Mutex<Core>,
    armed: bool,
}

impl<'a> ProbeGuard<'a> {
    fn new(core: &'a Mutex<Core>) -> Self {
        Self { core, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.core).machine.release_probe();
        }
    }
}

/// Tracks calls currently inside the operation.
struct Running<'a>(&'a AtomicUsize);

impl<'a> Running<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A named circuit breaker. Cheap to clone; clones share all state.
pub struct Breaker<A, T, E> {
    shared: Arc<Shared<A, T, E>>,
}

impl<A, T, E> Clone for Breaker<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<A, T, E> std::fmt::Debug for Breaker<A, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Breaker")
            .field("identity", &self.shared.identity)
            .field("state", &self.state())
            .finish()
    }
}

/// Non-owning handle held by background tasks.
pub(crate) struct WeakBreaker<A, T, E> {
    shared: Weak<Shared<A, T, E>>,
}

impl<A, T, E> WeakBreaker<A, T, E> {
    pub(crate) fn upgrade(&self) -> Option<Breaker<A, T, E>> {
        self.shared.upgrade().map(|shared| Breaker { shared })
    }
}

impl<A, T, E> Breaker<A, T, E> {
    /// Build a breaker. Settings are validated here, not on first call.
    pub fn new(
        identity: Identity,
        settings: BreakerSettings,
        callbacks: Callbacks<A, T, E>,
        hub: StatsHub,
    ) -> Result<Self, RegistrationError> {
        settings
            .validate()
            .map_err(|source| RegistrationError::InvalidSettings {
                circuit: identity.to_string(),
                source,
            })?;

        let window = RollingWindow::new(settings.bucket_span, settings.bucket_num, Instant::now());
        let core = Core {
            machine: StateMachine::new(),
            window,
            last_snapshot: None,
            monitor_running: false,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                identity,
                settings,
                callbacks: ArcSwap::from_pointee(callbacks),
                core: Mutex::new(core),
                concurrent: AtomicUsize::new(0),
                hub,
            }),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.shared.identity
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.shared.settings
    }

    /// Stored state. An open circuit whose duration has elapsed still reads
    /// `Open` until the next call or monitor tick moves it.
    pub fn state(&self) -> CircuitState {
        lock(&self.shared.core).machine.state()
    }

    pub fn callbacks(&self) -> Arc<Callbacks<A, T, E>> {
        self.shared.callbacks.load_full()
    }

    pub fn snapshot(&self) -> Snapshot {
        let now = Instant::now();
        let captured = self.capture(&lock(&self.shared.core), now);
        self.finish(captured)
    }

    pub(crate) fn downgrade(&self) -> WeakBreaker<A, T, E> {
        WeakBreaker {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn take_due_snapshot(&self) -> Option<Snapshot> {
        let now = Instant::now();
        let captured = {
            let mut core = lock(&self.shared.core);
            let due = core
                .last_snapshot
                .map_or(true, |at| now.saturating_duration_since(at) >= self.shared.settings.stat_interval);
            if !due {
                return None;
            }
            core.last_snapshot = Some(now);
            self.capture(&core, now)
        };
        Some(self.finish(captured))
    }

    /// Copy what a snapshot needs; the only part done under the lock.
    fn capture(&self, core: &Core, now: Instant) -> Captured {
        Captured {
            state: core.machine.state(),
            totals: core.window.totals(now),
            latencies: core.window.latency_samples(now),
        }
    }

    fn finish(&self, captured: Captured) -> Snapshot {
        let shared = &self.shared;
        let totals = captured.totals;
        Snapshot {
            name: shared.identity.name().to_string(),
            group: shared.identity.group().to_string(),
            state: captured.state,
            taken_at_ms: unix_millis(),
            totals,
            success_ratio: totals.success_ratio(),
            error_percentage: totals.error_percentage(),
            concurrent: shared.concurrent.load(Ordering::Relaxed),
            latency: captured.latencies.summarize(&shared.settings.percentiles),
            settings: (&shared.settings).into(),
        }
    }

    fn report(&self, transition: Transition) {
        let circuit = &self.shared.identity;
        metrics::record_state(circuit, transition.to);
        match transition.to {
            CircuitState::Open => {
                tracing::warn!(circuit = %circuit, from = %transition.from, "Circuit opened")
            }
            CircuitState::HalfOpen => {
                tracing::info!(circuit = %circuit, "Circuit half-open, probing recovery")
            }
            CircuitState::Closed => {
                tracing::info!(circuit = %circuit, "Circuit closed, normal operation resumed")
            }
        }
    }

    fn admit(&self) -> Admission {
        let now = Instant::now();
        let (admission, transition) =
            lock(&self.shared.core).machine.admit(now, self.shared.settings.circuit_duration);
        if let Some(transition) = transition {
            self.report(transition);
        }
        admission
    }
}

impl<A, T, E> Breaker<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Swap `run`, `is_failure`, `fallback` and `health_check`.
    /// State and window are left alone. A tripped circuit that gains a health
    /// check gets a monitor right away.
    pub fn replace_callbacks(&self, callbacks: Callbacks<A, T, E>) {
        let has_check = callbacks.health_check.is_some();
        self.shared.callbacks.store(Arc::new(callbacks));
        tracing::debug!(circuit = %self.shared.identity, "Circuit callbacks replaced");

        if !has_check {
            return;
        }
        let spawn_monitor = {
            let mut core = lock(&self.shared.core);
            let idle = core.machine.state() != CircuitState::Closed && !core.monitor_running;
            if idle {
                core.monitor_running = true;
            }
            idle
        };
        if spawn_monitor {
            tracing::info!(circuit = %self.shared.identity, "Health check added to tripped circuit, monitoring");
            HealthMonitor::new(self.downgrade(), self.shared.settings.health_check_interval).spawn();
        }
    }

    /// Run the wrapped operation through the circuit.
    pub async fn execute(&self, args: A) -> Result<T, BreakerError<E>> {
        let shared = &self.shared;
        let callbacks = shared.callbacks.load_full();

        let probe = match self.admit() {
            Admission::Reject => {
                self.complete(Outcome::ShortCircuited, Duration::ZERO, false);
                let cause = BreakerError::Open {
                    circuit: shared.identity.to_string(),
                };
                return self.fall_back(&callbacks, args, cause).await;
            }
            Admission::Probe => Some(ProbeGuard::new(&shared.core)),
            Admission::Pass => None,
        };

        let started = Instant::now();
        let result = {
            let _running = Running::enter(&shared.concurrent);
            time::timeout(shared.settings.timeout, (callbacks.run)(args.clone())).await
        };
        let latency = started.elapsed();
        let probed = probe.map(ProbeGuard::disarm).is_some();

        match result {
            Err(_) => {
                self.complete(Outcome::Timeout, latency, probed);
                let cause = BreakerError::Timeout {
                    circuit: shared.identity.to_string(),
                    timeout: shared.settings.timeout,
                };
                self.fall_back(&callbacks, args, cause).await
            }
            Ok(Ok(value)) => {
                self.complete(Outcome::Success, latency, probed);
                Ok(value)
            }
            Ok(Err(err)) if (callbacks.is_failure)(&err) => {
                self.complete(Outcome::Failure, latency, probed);
                self.fall_back(&callbacks, args, BreakerError::Operation(err)).await
            }
            Ok(Err(err)) => {
                self.complete(Outcome::Success, latency, probed);
                Err(BreakerError::Operation(err))
            }
        }
    }

    async fn fall_back(
        &self,
        callbacks: &Callbacks<A, T, E>,
        args: A,
        cause: BreakerError<E>,
    ) -> Result<T, BreakerError<E>> {
        let Some(fallback) = callbacks.fallback.as_ref() else {
            return Err(cause);
        };
        let circuit = &self.shared.identity;
        tracing::debug!(circuit = %circuit, cause = cause.kind(), "Running fallback");
        match fallback(args).await {
            Ok(value) => {
                metrics::record_fallback(circuit, true);
                Ok(value)
            }
            Err(err) => {
                metrics::record_fallback(circuit, false);
                Err(BreakerError::Fallback(err))
            }
        }
    }

    /// Record an outcome and apply any resulting transition.
    fn complete(&self, outcome: Outcome, latency: Duration, probed: bool) {
        let shared = &self.shared;
        let now = Instant::now();

        let (transition, state, spawn_monitor) = {
            let mut guard = lock(&shared.core);
            let core = &mut *guard;
            core.window.record(now, outcome, latency);

            let transition = match outcome {
                Outcome::ShortCircuited => None,
                _ if probed => core.machine.resolve_probe(outcome.is_success(), now),
                _ => {
                    let totals = core.window.totals(now);
                    core.machine.evaluate(
                        &totals,
                        shared.settings.threshold,
                        shared.settings.wait_threshold,
                        now,
                    )
                }
            };

            let to = transition.map(|t| t.to);
            if to == Some(CircuitState::Closed) {
                core.window.reset();
            }
            let spawn_monitor = to == Some(CircuitState::Open)
                && !core.monitor_running
                && shared.callbacks.load().health_check.is_some();
            if spawn_monitor {
                core.monitor_running = true;
            }
            (transition, core.machine.state(), spawn_monitor)
        };

        if let Some(transition) = transition {
            self.report(transition);
        }
        if spawn_monitor {
            HealthMonitor::new(self.downgrade(), shared.settings.health_check_interval).spawn();
        }

        metrics::record_outcome(&shared.identity, outcome, latency);
        shared.hub.publish(StatsEvent::Outcome(OutcomeEvent {
            name: shared.identity.name().to_string(),
            group: shared.identity.group().to_string(),
            state,
            outcome,
            latency_ms: latency.as_millis() as u64,
        }));
    }

    /// One out-of-band health probe, driven by the health monitor.
    pub(crate) async fn health_cycle(&self) -> HealthCycle {
        let shared = &self.shared;
        let check = shared.callbacks.load().health_check.clone();
        let now = Instant::now();

        let (claimed, transition) = {
            let mut core = lock(&shared.core);
            let transition = core.machine.poll_half_open(now, shared.settings.circuit_duration);
            if check.is_none() || core.machine.state() == CircuitState::Closed {
                core.monitor_running = false;
                return HealthCycle::Stop;
            }
            (core.machine.try_claim_probe(), transition)
        };
        if let Some(transition) = transition {
            self.report(transition);
        }
        let (Some(check), true) = (check, claimed) else {
            return HealthCycle::Continue;
        };

        let probe = ProbeGuard::new(&shared.core);
        let passed = matches!(time::timeout(shared.settings.timeout, check(())).await, Ok(Ok(())));
        probe.disarm();

        let transition = {
            let mut guard = lock(&shared.core);
            let core = &mut *guard;
            if passed {
                let transition = core.machine.resolve_probe(true, Instant::now());
                if transition.is_some() {
                    core.window.reset();
                }
                core.monitor_running = false;
                transition
            } else {
                core.machine.release_probe();
                None
            }
        };

        if passed {
            if let Some(transition) = transition {
                self.report(transition);
            }
            HealthCycle::Stop
        } else {
            tracing::debug!(circuit = %shared.identity, "Health check failed, circuit stays half-open");
            HealthCycle::Continue
        }
    }
}

impl<A, T, E> Circuit for Breaker<A, T, E>
where
    A: 'static,
    T: 'static,
    E: 'static,
{
    fn identity(&self) -> &Identity {
        Breaker::identity(self)
    }

    fn state(&self) -> CircuitState {
        Breaker::state(self)
    }

    fn snapshot(&self) -> Snapshot {
        Breaker::snapshot(self)
    }

    fn take_due_snapshot(&self) -> Option<Snapshot> {
        Breaker::take_due_snapshot(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
