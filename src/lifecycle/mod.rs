//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging/metrics → Registry → Emitter → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → trigger → server stops accepting,
//!     open streams end, snapshot emitter exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal returns
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
