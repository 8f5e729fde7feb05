//! Typed breaker settings.
//!
//! `BreakerSettings` is the fully resolved, validated set a breaker runs with.
//! `SettingsOverrides` carries the optional per-call (or per-config-file) values
//! that are laid over a base set; unset fields keep the base value.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Percentile levels reported in snapshots unless overridden.
pub const DEFAULT_PERCENTILES: [f64; 9] = [0.0, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99, 0.995, 1.0];

/// Invalid breaker settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("percentile must be in [0, 1], got {0}")]
    PercentileOutOfRange(f64),
}

/// Named default sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultsProfile {
    #[default]
    Standard,
    /// Short timeout, small warm-up; matches the first plugin release.
    Legacy,
}

/// Resolved settings for one breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSettings {
    /// Deadline for a single operation call.
    pub timeout: Duration,
    /// Minimum success ratio to stay closed, in (0, 1].
    pub threshold: f64,
    /// Requests in the window before the ratio is evaluated.
    pub wait_threshold: u64,
    /// Minimum spacing between published snapshots.
    pub stat_interval: Duration,
    pub bucket_span: Duration,
    pub bucket_num: usize,
    /// Time spent open before a probe is allowed.
    pub circuit_duration: Duration,
    pub health_check_interval: Duration,
    pub percentiles: Vec<f64>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::for_profile(DefaultsProfile::Standard)
    }
}

impl BreakerSettings {
    pub fn for_profile(profile: DefaultsProfile) -> Self {
        let standard = Self {
            timeout: Duration::from_millis(10_000),
            threshold: 0.6,
            wait_threshold: 100,
            stat_interval: Duration::from_millis(1_200),
            bucket_span: Duration::from_millis(1_000),
            bucket_num: 60,
            circuit_duration: Duration::from_millis(30_000),
            health_check_interval: Duration::from_millis(5_000),
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        };
        match profile {
            DefaultsProfile::Standard => standard,
            DefaultsProfile::Legacy => Self {
                timeout: Duration::from_millis(400),
                wait_threshold: 20,
                stat_interval: Duration::from_millis(5_000),
                ..standard
            },
        }
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.bucket_span * self.bucket_num as u32
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(SettingsError::ThresholdOutOfRange(self.threshold));
        }
        let durations = [
            ("timeout", self.timeout),
            ("stat_interval", self.stat_interval),
            ("bucket_span", self.bucket_span),
            ("circuit_duration", self.circuit_duration),
            ("health_check_interval", self.health_check_interval),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(SettingsError::Zero(field));
            }
        }
        if self.bucket_num == 0 {
            return Err(SettingsError::Zero("bucket_num"));
        }
        if let Some(p) = self
            .percentiles
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(SettingsError::PercentileOutOfRange(*p));
        }
        Ok(())
    }
}

/// Optional settings laid over a base `BreakerSettings`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_threshold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_span_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_num: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<Vec<f64>>,
}

impl SettingsOverrides {
    pub fn apply(&self, base: &BreakerSettings) -> BreakerSettings {
        let ms = |value: Option<u64>, fallback: Duration| value.map(Duration::from_millis).unwrap_or(fallback);
        BreakerSettings {
            timeout: ms(self.timeout_ms, base.timeout),
            threshold: self.threshold.unwrap_or(base.threshold),
            wait_threshold: self.wait_threshold.unwrap_or(base.wait_threshold),
            stat_interval: ms(self.stat_interval_ms, base.stat_interval),
            bucket_span: ms(self.bucket_span_ms, base.bucket_span),
            bucket_num: self.bucket_num.unwrap_or(base.bucket_num),
            circuit_duration: ms(self.circuit_duration_ms, base.circuit_duration),
            health_check_interval: ms(self.health_check_interval_ms, base.health_check_interval),
            percentiles: self
                .percentiles
                .clone()
                .unwrap_or_else(|| base.percentiles.clone()),
        }
    }
}
