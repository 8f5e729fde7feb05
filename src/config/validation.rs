//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, paths and value ranges
//! - Validate the resolved breaker defaults
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CircuitConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::CircuitConfig;
use crate::resilience::settings::SettingsError;

const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";
const MIN_API_KEY_LEN: usize = 16;
const HEALTH_PATH: &str = "/health";
const ADMIN_PREFIX: &str = "/admin";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("stream path must be a static path starting with '/': {0}")]
    InvalidStreamPath(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid breaker defaults: {0}")]
    InvalidDefaults(#[from] SettingsError),

    #[error("admin api_key must be set to at least 16 characters")]
    WeakApiKey,

    #[error("stream path {0} collides with another route")]
    PathConflict(String),
}

pub fn validate_config(config: &CircuitConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("server.request_timeout_secs"));
    }

    let stream = &config.stream;
    if !is_static_path(&stream.path) {
        errors.push(ValidationError::InvalidStreamPath(stream.path.clone()));
    } else if stream.enabled && collides(&stream.path, config.admin.enabled) {
        errors.push(ValidationError::PathConflict(stream.path.clone()));
    }
    if stream.tick_ms == 0 {
        errors.push(ValidationError::Zero("stream.tick_ms"));
    }
    if stream.channel_capacity == 0 {
        errors.push(ValidationError::Zero("stream.channel_capacity"));
    }

    if let Err(e) = config.defaults.resolve().validate() {
        errors.push(e.into());
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    let admin = &config.admin;
    if admin.enabled && (admin.api_key == PLACEHOLDER_API_KEY || admin.api_key.len() < MIN_API_KEY_LEN) {
        errors.push(ValidationError::WeakApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A literal route: no captures, wildcards or characters the router would
/// treat specially.
fn is_static_path(path: &str) -> bool {
    path.starts_with('/')
        && path
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b'-' | b'_' | b'.' | b'~'))
}

fn collides(path: &str, admin_enabled: bool) -> bool {
    let trimmed = path.trim_end_matches('/');
    trimmed == HEALTH_PATH || (admin_enabled && (trimmed == ADMIN_PREFIX || path.starts_with("/admin/")))
}
