//! Circuit breakers for async operations, a process-wide registry, and a
//! Hystrix dashboard compatible statistics stream.
//!
//! ```ignore
//! let registry = Registry::default();
//! let breaker = registry.wrap(
//!     BreakerOptions::new("get-user")
//!         .group("users")
//!         .run(|id: u64| async move { fetch_user(id).await })
//!         .fallback(|_| async { Ok(User::anonymous()) }),
//! )?;
//! let user = breaker.execute(42).await?;
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod stats;

pub use config::CircuitConfig;
pub use error::{BreakerError, RegistrationError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::{Identity, Registry};
pub use resilience::{Breaker, BreakerOptions, BreakerSettings, Circuit, CircuitState};
pub use stats::{StatsHub, SnapshotEmitter};
