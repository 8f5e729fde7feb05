//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use circuit_gate::config::CircuitConfig;
use circuit_gate::{HttpServer, Registry, Shutdown};
use tokio::net::TcpListener;

pub const API_KEY: &str = "integration-test-admin-key";

#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config with the admin API enabled under [`API_KEY`].
#[allow(dead_code)]
pub fn admin_config() -> CircuitConfig {
    let mut config = CircuitConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = API_KEY.to_string();
    config
}

/// Serve `registry` on an ephemeral port.
pub async fn start_server(config: CircuitConfig, registry: Arc<Registry>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, registry.clone(), shutdown.clone());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        registry,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Read SSE frames until `count` `data:` records arrived.
#[allow(dead_code)]
pub async fn read_records(res: &mut reqwest::Response, count: usize) -> Vec<serde_json::Value> {
    let mut buffer = String::new();
    let mut records = Vec::new();
    while records.len() < count {
        let chunk = tokio::time::timeout(Duration::from_secs(5), res.chunk())
            .await
            .expect("stream stalled")
            .unwrap()
            .expect("stream ended early");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(end) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..end + 2).collect();
            if let Some(data) = frame.trim().strip_prefix("data: ") {
                records.push(serde_json::from_str(data).unwrap());
            }
        }
    }
    records
}
