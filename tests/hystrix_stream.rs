//! Hystrix stream over HTTP.

use std::sync::Arc;
use std::time::Duration;

use circuit_gate::config::CircuitConfig;
use circuit_gate::{BreakerOptions, Registry, SnapshotEmitter};

mod common;

fn registry_with_users() -> Arc<Registry> {
    let registry = Arc::new(Registry::default());
    registry
        .wrap(
            BreakerOptions::<(), u32, String>::new("users")
                .group("api")
                .run(|_| async { Ok(1) })
                .stat_interval(Duration::from_millis(100)),
        )
        .unwrap();
    registry
}

#[tokio::test]
async fn test_stream_headers_and_initial_snapshot() {
    let registry = registry_with_users();
    let breaker = registry.breaker::<(), u32, String>(&circuit_gate::Identity::new("users", "api")).unwrap().unwrap();
    breaker.execute(()).await.unwrap();

    let server = common::start_server(CircuitConfig::default(), registry).await;
    let mut res = common::client().get(server.url("/hystrix")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    let headers = res.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["content-encoding"], "identity");
    assert_eq!(headers["cache-control"], "no-cache, no-store, max-age=0, must-revalidate");
    assert_eq!(headers["pragma"], "no-cache");

    let records = common::read_records(&mut res, 1).await;
    let record = &records[0];
    assert_eq!(record["type"], "HystrixCommand");
    assert_eq!(record["name"], "users");
    assert_eq!(record["group"], "api");
    assert_eq!(record["requestCount"], 1);
    assert_eq!(record["isCircuitBreakerOpen"], false);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_stream_follows_emitted_snapshots() {
    let registry = registry_with_users();
    let server = common::start_server(CircuitConfig::default(), registry.clone()).await;
    tokio::spawn(
        SnapshotEmitter::new(registry, Duration::from_millis(20)).run(server.shutdown.subscribe()),
    );

    let mut res = common::client().get(server.url("/hystrix")).send().await.unwrap();
    let records = common::read_records(&mut res, 3).await;
    assert!(records.iter().all(|r| r["name"] == "users"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_stream_ends_on_shutdown() {
    let server = common::start_server(CircuitConfig::default(), registry_with_users()).await;
    let mut res = common::client().get(server.url("/hystrix")).send().await.unwrap();
    common::read_records(&mut res, 1).await;

    server.shutdown.trigger();
    let end = tokio::time::timeout(Duration::from_secs(5), async {
        while res.chunk().await.unwrap().is_some() {}
    })
    .await;
    assert!(end.is_ok(), "stream should close after shutdown");
}

#[tokio::test]
async fn test_stream_path_and_disable() {
    let mut config = CircuitConfig::default();
    config.stream.path = "/api/hystrix.stream".to_string();
    let server = common::start_server(config, registry_with_users()).await;
    let client = common::client();

    let res = client.get(server.url("/hystrix")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let mut res = client.get(server.url("/api/hystrix.stream")).send().await.unwrap();
    assert_eq!(common::read_records(&mut res, 1).await.len(), 1);
    server.shutdown.trigger();

    let mut config = CircuitConfig::default();
    config.stream.enabled = false;
    let server = common::start_server(config, registry_with_users()).await;
    let res = client.get(server.url("/hystrix")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    server.shutdown.trigger();
}
