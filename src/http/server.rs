//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the stream and admin handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve on a listener until shutdown is triggered

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::config::{AdminConfig, CircuitConfig};
use crate::http::request::{request_id_of, MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::stream::hystrix_stream;
use crate::lifecycle::Shutdown;
use crate::registry::Registry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub admin: AdminConfig,
    pub shutdown: Shutdown,
}

/// HTTP server exposing the Hystrix stream and the admin API.
pub struct HttpServer {
    router: Router,
    config: CircuitConfig,
}

impl HttpServer {
    pub fn new(config: CircuitConfig, registry: Arc<Registry>, shutdown: Shutdown) -> Self {
        let state = AppState {
            registry,
            admin: config.admin.clone(),
            shutdown,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &CircuitConfig, state: AppState) -> Router {
        let mut router = Router::new().route("/health", get(|| async { "ok" }));

        if config.stream.enabled {
            router = router.route(&config.stream.path, get(hystrix_stream));
            tracing::info!(path = %config.stream.path, "Hystrix stream enabled");
        }
        if config.admin.enabled {
            router = router.merge(admin::setup_admin_router(state.clone()));
        }

        let request_id = HeaderName::from_static(X_REQUEST_ID);
        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "http",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id_of(request),
                    )
                }))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs))),
        )
    }

    /// The assembled router, for serving elsewhere or testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
