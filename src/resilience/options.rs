//! Registration options for a breaker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RegistrationError;
use crate::registry::{Identity, DEFAULT_GROUP};
use crate::resilience::operation::{self, Callbacks, FailurePredicate, HealthCheck, Operation};
use crate::resilience::settings::SettingsOverrides;

/// Everything `Registry::wrap` needs to create or update a breaker.
///
/// ```ignore
/// let options = BreakerOptions::new("get-user")
///     .group("users")
///     .run(|id: u64| async move { fetch(id).await })
///     .fallback(|_| async { Ok(User::anonymous()) })
///     .wait_threshold(20);
/// ```
pub struct BreakerOptions<A, T, E> {
    name: String,
    group: String,
    run: Option<Operation<A, T, E>>,
    is_failure: Option<FailurePredicate<E>>,
    fallback: Option<Operation<A, T, E>>,
    health_check: Option<HealthCheck<E>>,
    overrides: SettingsOverrides,
}

impl<A, T, E> BreakerOptions<A, T, E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: DEFAULT_GROUP.to_string(),
            run: None,
            is_failure: None,
            fallback: None,
            health_check: None,
            overrides: SettingsOverrides::default(),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn run<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.run = Some(operation::operation(f));
        self
    }

    pub fn is_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_failure = Some(Arc::new(f));
        self
    }

    pub fn fallback<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.fallback = Some(operation::operation(f));
        self
    }

    pub fn health_check<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.health_check = Some(operation::health_check(f));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.overrides.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.overrides.threshold = Some(threshold);
        self
    }

    pub fn wait_threshold(mut self, requests: u64) -> Self {
        self.overrides.wait_threshold = Some(requests);
        self
    }

    pub fn stat_interval(mut self, interval: Duration) -> Self {
        self.overrides.stat_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn bucket_span(mut self, span: Duration) -> Self {
        self.overrides.bucket_span_ms = Some(span.as_millis() as u64);
        self
    }

    pub fn bucket_num(mut self, buckets: usize) -> Self {
        self.overrides.bucket_num = Some(buckets);
        self
    }

    pub fn circuit_duration(mut self, duration: Duration) -> Self {
        self.overrides.circuit_duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.overrides.health_check_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.overrides.percentiles = Some(percentiles);
        self
    }

    /// Replace all setting overrides at once, e.g. from a config file.
    pub fn overrides(mut self, overrides: SettingsOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Split into identity, overrides and callbacks.
    pub fn into_parts(
        self,
    ) -> Result<(Identity, SettingsOverrides, Callbacks<A, T, E>), RegistrationError> {
        if self.name.is_empty() {
            return Err(RegistrationError::MissingName);
        }
        let identity = Identity::new(self.name, self.group);
        let run = self
            .run
            .ok_or_else(|| RegistrationError::MissingRun(identity.to_string()))?;

        let mut callbacks = Callbacks::new(run);
        if let Some(is_failure) = self.is_failure {
            callbacks.is_failure = is_failure;
        }
        callbacks.fallback = self.fallback;
        callbacks.health_check = self.health_check;

        Ok((identity, self.overrides, callbacks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_name_and_run() {
        let unnamed = BreakerOptions::<(), (), String>::new("").run(|_| async { Ok(()) });
        assert_eq!(unnamed.into_parts().unwrap_err(), RegistrationError::MissingName);

        let no_run = BreakerOptions::<(), (), String>::new("orders");
        assert_eq!(
            no_run.into_parts().unwrap_err(),
            RegistrationError::MissingRun("default/orders".to_string())
        );
    }

    #[test]
    fn test_collects_overrides_and_callbacks() {
        let (identity, overrides, callbacks) = BreakerOptions::<u32, u32, String>::new("orders")
            .group("shop")
            .run(|x| async move { Ok(x) })
            .fallback(|_| async { Ok(0) })
            .is_failure(|e: &String| e != "not found")
            .wait_threshold(5)
            .circuit_duration(Duration::from_millis(250))
            .into_parts()
            .unwrap();

        assert_eq!(identity, Identity::new("orders", "shop"));
        assert_eq!(overrides.wait_threshold, Some(5));
        assert_eq!(overrides.circuit_duration_ms, Some(250));
        assert_eq!(overrides.timeout_ms, None);
        assert!(callbacks.fallback.is_some());
        assert!(callbacks.health_check.is_none());
        assert!(!(callbacks.is_failure)(&"not found".to_string()));
    }
}
