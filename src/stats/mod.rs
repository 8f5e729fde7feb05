//! Statistics subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker::execute
//!     → OutcomeEvent (every recorded call)      ─┐
//! emitter.rs (ticker)                            ├→ StatsHub (broadcast)
//!     → Snapshot (per breaker, at stat_interval) ─┘
//!                                                     → /hystrix stream (hystrix.rs format)
//!                                                     → any other subscriber
//! ```
//!
//! Publishing is fire-and-forget: a full or subscriber-less channel never
//! blocks or fails the calling path.

pub mod emitter;
pub mod hystrix;
pub mod snapshot;

use tokio::sync::broadcast;

pub use emitter::SnapshotEmitter;
pub use snapshot::{OutcomeEvent, Snapshot, StatsEvent};

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast hub shared by every breaker of a registry.
#[derive(Debug, Clone)]
pub struct StatsHub {
    tx: broadcast::Sender<StatsEvent>,
}

impl StatsHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: StatsEvent) {
        // No subscribers is the normal idle case.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatsEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StatsHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
