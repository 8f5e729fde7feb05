//! Asynchronous operation contract.
//!
//! `run`, `fallback` and `health_check` all share one shape: an async function
//! from arguments to `Result<T, E>`. They are stored type-erased so a breaker can
//! swap them at runtime without changing its own type.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

/// A shareable async function returning a result-or-error.
pub type Operation<A, T, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Probe used to decide whether a broken circuit may close again.
pub type HealthCheck<E> = Operation<(), (), E>;

/// Classifies an operation error. `true` counts it against the circuit.
pub type FailurePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Box an async closure into an [`Operation`].
pub fn operation<A, T, E, F, Fut>(f: F) -> Operation<A, T, E>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Arc::new(move |args: A| -> BoxFuture<'static, Result<T, E>> { f(args).boxed() })
}

/// Box an argument-less async closure into a [`HealthCheck`].
pub fn health_check<E, F, Fut>(f: F) -> HealthCheck<E>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    Arc::new(move |_: ()| -> BoxFuture<'static, Result<(), E>> { f().boxed() })
}

/// Every error is a failure unless told otherwise.
pub fn every_error_fails<E>() -> FailurePredicate<E> {
    Arc::new(|_: &E| true)
}

/// The replaceable behaviour of a breaker.
///
/// Swapped as a unit on re-registration; never carries statistics.
pub struct Callbacks<A, T, E> {
    pub run: Operation<A, T, E>,
    pub is_failure: FailurePredicate<E>,
    pub fallback: Option<Operation<A, T, E>>,
    pub health_check: Option<HealthCheck<E>>,
}

impl<A, T, E> Callbacks<A, T, E> {
    /// Callbacks with only a `run` operation.
    pub fn new(run: Operation<A, T, E>) -> Self {
        Self {
            run,
            is_failure: every_error_fails(),
            fallback: None,
            health_check: None,
        }
    }
}

impl<A, T, E> Clone for Callbacks<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            run: self.run.clone(),
            is_failure: self.is_failure.clone(),
            fallback: self.fallback.clone(),
            health_check: self.health_check.clone(),
        }
    }
}

impl<A, T, E> std::fmt::Debug for Callbacks<A, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("fallback", &self.fallback.is_some())
            .field("health_check", &self.health_check.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operation_forwards_arguments() {
        let double: Operation<u32, u32, String> = operation(|x: u32| async move { Ok(x * 2) });
        assert_eq!(double(21).await, Ok(42));

        let probe: HealthCheck<String> = health_check(|| async { Err("down".to_string()) });
        assert_eq!(probe(()).await, Err("down".to_string()));
    }

    #[test]
    fn test_default_predicate_counts_everything() {
        let callbacks = Callbacks::new(operation(|_: ()| async { Ok::<(), &str>(()) }));
        assert!((callbacks.is_failure)(&"anything"));
        assert!(callbacks.fallback.is_none());
    }
}
