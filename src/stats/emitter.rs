//! Periodic snapshot publisher.
//!
//! Ticks at `stream.tick_ms` and publishes a snapshot for every breaker whose
//! own `stat_interval` has elapsed since its previous one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::registry::Registry;
use crate::stats::StatsEvent;

pub struct SnapshotEmitter {
    registry: Arc<Registry>,
    tick: Duration,
}

impl SnapshotEmitter {
    pub fn new(registry: Arc<Registry>, tick: Duration) -> Self {
        Self {
            registry,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(tick_ms = self.tick.as_millis() as u64, "Snapshot emitter starting");

        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.emit_due();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Snapshot emitter received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Publish every due snapshot; returns how many were published.
    pub fn emit_due(&self) -> usize {
        let hub = self.registry.hub();
        let mut published = 0;
        for circuit in self.registry.circuits() {
            if let Some(snapshot) = circuit.take_due_snapshot() {
                hub.publish(StatsEvent::Snapshot(snapshot));
                published += 1;
            }
        }
        if published > 0 {
            tracing::trace!(published, "Snapshots published");
        }
        published
    }
}
