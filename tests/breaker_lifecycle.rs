//! End-to-end breaker behaviour through the public registry API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use circuit_gate::stats::StatsEvent;
use circuit_gate::{BreakerError, BreakerOptions, CircuitState, Identity, Registry};

#[tokio::test(start_paused = true)]
async fn test_trip_fallback_and_recover() {
    let registry = Registry::default();
    let healthy = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));

    let flag = healthy.clone();
    let counter = calls.clone();
    let breaker = registry
        .wrap(
            BreakerOptions::<u32, u32, String>::new("quote")
                .group("pricing")
                .run(move |x| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let up = flag.load(Ordering::SeqCst);
                    async move { if up { Ok(x) } else { Err("upstream down".to_string()) } }
                })
                .fallback(|_| async { Ok(0) })
                .wait_threshold(5)
                .circuit_duration(Duration::from_secs(10)),
        )
        .unwrap();

    for x in 1..=5 {
        assert_eq!(breaker.execute(x).await.unwrap(), 0);
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    // Short-circuited straight to the fallback.
    assert_eq!(breaker.execute(6).await.unwrap(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    healthy.store(true, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(breaker.execute(7).await.unwrap(), 7);
    assert_eq!(breaker.state(), CircuitState::Closed);

    let snapshot = registry.find(&Identity::new("quote", "pricing")).unwrap().snapshot();
    assert_eq!(snapshot.requests(), 0, "window starts fresh after recovery");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_fallback() {
    let registry = Registry::default();
    let breaker = registry
        .wrap(
            BreakerOptions::<(), (), String>::new("slow")
                .run(|_| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                })
                .timeout(Duration::from_millis(400)),
        )
        .unwrap();

    let err = breaker.execute(()).await.unwrap_err();
    assert!(matches!(err, BreakerError::Timeout { timeout, .. } if timeout == Duration::from_millis(400)));
    assert_eq!(err.to_string(), "circuit default/slow timed out after 400ms");
}

#[tokio::test]
async fn test_every_call_publishes_an_outcome() {
    let registry = Registry::default();
    let mut events = registry.hub().subscribe();
    let breaker = registry
        .wrap(BreakerOptions::<(), (), String>::new("ping").run(|_| async { Ok(()) }))
        .unwrap();

    for _ in 0..3 {
        breaker.execute(()).await.unwrap();
    }
    for _ in 0..3 {
        match events.recv().await.unwrap() {
            StatsEvent::Outcome(event) => assert_eq!(event.name, "ping"),
            StatsEvent::Snapshot(_) => panic!("no emitter is running"),
        }
    }
}
