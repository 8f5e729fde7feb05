//! circuit-gate server.
//!
//! # Architecture Overview
//!
//! ```text
//!   embedding code / demo load
//!            │ Registry::wrap → Breaker::execute
//!            ▼
//!   ┌──────────────────┐  OutcomeEvent   ┌──────────┐
//!   │ Registry         │────────────────▶│ StatsHub │──▶ GET /hystrix (SSE)
//!   │  Breaker ×N      │                 │broadcast │
//!   └────────┬─────────┘                 └──────────┘
//!            │ take_due_snapshot              ▲
//!            ▼                                │ Snapshot
//!   ┌──────────────────┐                      │
//!   │ SnapshotEmitter  │──────────────────────┘
//!   └──────────────────┘
//!
//!   config watcher ──▶ registry defaults      admin API ──▶ registry
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use circuit_gate::config::watcher::ConfigWatcher;
use circuit_gate::config::{load_config, CircuitConfig};
use circuit_gate::lifecycle::signals::wait_for_signal;
use circuit_gate::observability::{logging, metrics};
use circuit_gate::{BreakerOptions, HttpServer, Registry, Shutdown, SnapshotEmitter, StatsHub};

#[derive(Parser)]
#[command(name = "circuit-gate", version, about = "Circuit breaker registry with a Hystrix stream")]
struct Args {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Register demo circuits and drive synthetic load through them
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => CircuitConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "circuit-gate starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        stream_enabled = config.stream.enabled,
        stream_path = %config.stream.path,
        admin_enabled = config.admin.enabled,
        profile = ?config.defaults.profile,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = Arc::new(Registry::new(
        config.defaults.resolve(),
        StatsHub::new(config.stream.channel_capacity),
    ));
    let shutdown = Shutdown::new();

    // Keep the watcher handle alive for the life of the process.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path, config.clone());
            let handle = watcher.run()?;
            let registry = registry.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    registry.set_defaults(new_config.defaults.resolve());
                }
            });
            Some(handle)
        }
        None => None,
    };

    let emitter = SnapshotEmitter::new(registry.clone(), Duration::from_millis(config.stream.tick_ms));
    tokio::spawn(emitter.run(shutdown.subscribe()));

    if args.demo {
        spawn_demo(&registry, &shutdown)?;
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(config, registry, shutdown.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Two circuits: one healthy, one failing every other call in bursts.
fn spawn_demo(registry: &Registry, shutdown: &Shutdown) -> Result<(), circuit_gate::RegistrationError> {
    let steady = registry.wrap(
        BreakerOptions::<u64, u64, String>::new("steady")
            .group("demo")
            .run(|n| async move {
                tokio::time::sleep(Duration::from_millis(5 + n % 20)).await;
                Ok(n)
            }),
    )?;
    let flaky = registry.wrap(
        BreakerOptions::<u64, u64, String>::new("flaky")
            .group("demo")
            .run(|n| async move {
                // Healthy for 30s, then failing for 30s.
                if (n / 300) % 2 == 1 && n % 3 != 0 {
                    Err(format!("call {} failed", n))
                } else {
                    Ok(n)
                }
            })
            .fallback(|_| async { Ok(0) })
            .wait_threshold(20)
            .circuit_duration(Duration::from_secs(5)),
    )?;

    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        let mut n: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    n += 1;
                    let _ = steady.execute(n).await;
                    let _ = flaky.execute(n).await;
                }
                _ = stop.recv() => break,
            }
        }
    });
    tracing::info!("Demo circuits registered under group \"demo\"");
    Ok(())
}
