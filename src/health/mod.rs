//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker trips (Closed → Open) with a health check configured
//!     → active.rs monitor spawned (at most one per breaker)
//!     → every health_check_interval:
//!           Open and circuit_duration elapsed → Half-Open
//!           Half-Open and probe slot free    → run health check
//!               Ok  → Closed, window reset, monitor exits
//!               Err → stay Half-Open, try again next tick
//! ```
//!
//! # Design Decisions
//! - The health check competes with in-band calls for the single probe slot
//! - The monitor never keeps a breaker alive

pub mod active;
