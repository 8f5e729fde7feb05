//! Admin API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, circuit counts, stream subscribers
//! - `GET /admin/circuits`: snapshots grouped by group, then name
//! - `GET /admin/circuits/{group}/{name}`: one snapshot, 404 if unknown
//!
//! Every endpoint requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/circuits/{group}/{name}", get(get_circuit))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
