//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, registry, server:
//!     → logging.rs (structured tracing events, pretty or JSON)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout / log aggregation
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every HTTP log line
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
