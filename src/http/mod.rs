//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, middleware stack)
//!     → request.rs (request ID assigned, echoed on the response)
//!     → stream.rs  GET {stream.path}  (Hystrix SSE, long-lived)
//!     → admin/     GET /admin/*       (bearer-protected JSON)
//! ```

pub mod request;
pub mod server;
pub mod stream;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
