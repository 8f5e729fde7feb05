//! Hystrix dashboard event stream.
//!
//! # Data Flow
//! ```text
//! client connects
//!     → subscribe to StatsHub
//!     → one frame per registered breaker (current snapshot)
//!     → one frame per published snapshot, until shutdown
//! ```
//!
//! Outcome events are skipped; the dashboard only consumes snapshots. A slow
//! client that lags behind the hub loses the oldest snapshots, not the
//! connection.

use std::collections::VecDeque;
use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::http::server::AppState;
use crate::stats::hystrix;
use crate::stats::{Snapshot, StatsEvent};

pub const CACHE_CONTROL_VALUE: &str = "no-cache, no-store, max-age=0, must-revalidate";

pub async fn hystrix_stream(State(state): State<AppState>) -> impl IntoResponse {
    let events = state.registry.hub().subscribe();
    let shutdown = state.shutdown.subscribe();
    let initial: VecDeque<Snapshot> = state
        .registry
        .circuits()
        .iter()
        .map(|circuit| circuit.snapshot())
        .collect();

    tracing::info!(circuits = initial.len(), "Hystrix stream client connected");

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CONTENT_ENCODING, "identity"),
            (header::CACHE_CONTROL, CACHE_CONTROL_VALUE),
            (header::PRAGMA, "no-cache"),
        ],
        Body::from_stream(hystrix_frames(initial, events, shutdown)),
    )
}

struct Feed {
    initial: VecDeque<Snapshot>,
    events: broadcast::Receiver<StatsEvent>,
    shutdown: broadcast::Receiver<()>,
}

/// SSE frames: queued snapshots first, then live ones until shutdown.
pub fn hystrix_frames(
    initial: VecDeque<Snapshot>,
    events: broadcast::Receiver<StatsEvent>,
    shutdown: broadcast::Receiver<()>,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    let feed = Feed {
        initial,
        events,
        shutdown,
    };

    stream::unfold(feed, |mut feed| async move {
        if let Some(snapshot) = feed.initial.pop_front() {
            return Some((Ok(frame(&snapshot)), feed));
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = feed.shutdown.recv() => None,
                event = feed.events.recv() => Some(event),
            };

            match event {
                None | Some(Err(RecvError::Closed)) => {
                    tracing::info!("Hystrix stream closed");
                    return None;
                }
                Some(Ok(StatsEvent::Snapshot(snapshot))) => {
                    return Some((Ok(frame(&snapshot)), feed));
                }
                Some(Ok(StatsEvent::Outcome(_))) => continue,
                Some(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Hystrix stream client lagging, events dropped");
                }
            }
        }
    })
}

fn frame(snapshot: &Snapshot) -> String {
    hystrix::sse_frame(snapshot).unwrap_or_else(|e| {
        tracing::error!(error = %e, circuit = %snapshot.name, "Failed to encode Hystrix record");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::registry::Registry;
    use crate::resilience::options::BreakerOptions;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_initial_then_live_then_shutdown() {
        let registry = Registry::default();
        let breaker = registry
            .wrap(BreakerOptions::<(), (), String>::new("users").run(|_| async { Ok(()) }))
            .unwrap();
        let shutdown = Shutdown::new();

        let events = registry.hub().subscribe();
        let initial = VecDeque::from(vec![breaker.snapshot()]);
        let frames = hystrix_frames(initial, events, shutdown.subscribe());
        tokio::pin!(frames);

        let first = frames.next().await.unwrap().unwrap();
        assert!(first.contains("\"name\":\"users\""));

        breaker.execute(()).await.unwrap();
        registry.hub().publish(StatsEvent::Snapshot(breaker.snapshot()));
        let second = frames.next().await.unwrap().unwrap();
        assert!(second.contains("\"requestCount\":1"));

        shutdown.trigger();
        assert!(frames.next().await.is_none());
    }
}
