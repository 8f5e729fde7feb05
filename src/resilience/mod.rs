//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! options.rs (BreakerOptions)
//!     → settings.rs (defaults + overrides → validated BreakerSettings)
//!     → operation.rs (run / fallback / health_check / is_failure)
//!     → circuit_breaker.rs (Breaker::execute)
//!         → state.rs (Closed / Open / Half-Open decisions)
//!         → window.rs (rolling outcome buckets)
//! ```
//!
//! # Design Decisions
//! - Every call has a deadline; a timeout counts as a failure
//! - State decisions are pure functions of the window and the clock
//! - Time comes from `tokio::time`, so tests drive it with a paused clock

pub mod circuit_breaker;
pub mod operation;
pub mod options;
pub mod settings;
pub mod state;
pub mod window;

pub use circuit_breaker::{Breaker, Circuit};
pub use options::BreakerOptions;
pub use settings::{BreakerSettings, DefaultsProfile, SettingsOverrides};
pub use state::CircuitState;
