//! Configuration schema definitions.
//!
//! All sections default, so an empty file (or no file) is a valid config.

use serde::{Deserialize, Serialize};

use crate::resilience::settings::{BreakerSettings, DefaultsProfile, SettingsOverrides};

/// Root configuration for the circuit server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitConfig {
    pub server: ServerConfig,

    /// Hystrix event stream.
    pub stream: StreamConfig,

    /// Settings applied to breakers registered without overrides.
    pub defaults: DefaultsConfig,

    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Deadline for non-streaming requests.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Set to false to skip mounting the stream route.
    pub enabled: bool,

    pub path: String,

    /// How often breakers are checked for due snapshots.
    pub tick_ms: u64,

    /// Events buffered per stream subscriber before it starts lagging.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/hystrix".to_string(),
            tick_ms: 100,
            channel_capacity: crate::stats::DEFAULT_CAPACITY,
        }
    }
}

/// Profile plus optional field overrides.
///
/// ```toml
/// [defaults]
/// profile = "legacy"
/// wait_threshold = 50
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub profile: DefaultsProfile,

    #[serde(flatten)]
    pub overrides: SettingsOverrides,
}

impl DefaultsConfig {
    pub fn resolve(&self) -> BreakerSettings {
        self.overrides.apply(&BreakerSettings::for_profile(self.profile))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// Bearer token required on every admin request.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // Placeholder; validation rejects it once admin is enabled.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
