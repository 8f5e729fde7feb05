//! Process-wide circuit registry.
//!
//! # Responsibilities
//! - Hold every breaker, keyed by (name, group)
//! - Create a breaker on first registration, update its callbacks afterwards
//! - Hand out the grouped index used by the admin API and the stream
//!
//! # Design Decisions
//! - Breakers of different operation signatures share one map through the
//!   object-safe `Circuit` trait; typed access downcasts
//! - Registration for one identity is serialized by the map's entry lock, so
//!   concurrent `wrap` calls create exactly one breaker
//! - Updating a breaker keeps its settings and statistics; only callbacks change

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::error::RegistrationError;
use crate::resilience::circuit_breaker::{Breaker, Circuit};
use crate::resilience::operation::Callbacks;
use crate::resilience::options::BreakerOptions;
use crate::resilience::settings::BreakerSettings;
use crate::stats::StatsHub;

/// Group used when a registration names none.
pub const DEFAULT_GROUP: &str = "default";

/// Unique key of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identity {
    name: String,
    group: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Identity in the default group.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Flat `name + group` key, as emitted to dashboards.
    pub fn key(&self) -> String {
        format!("{}{}", self.name, self.group)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// Circuits indexed by group, then name.
pub type GroupedCircuits = BTreeMap<String, BTreeMap<String, Arc<dyn Circuit>>>;

pub struct Registry {
    circuits: DashMap<Identity, Arc<dyn Circuit>>,
    defaults: ArcSwap<BreakerSettings>,
    hub: StatsHub,
}

impl Registry {
    pub fn new(defaults: BreakerSettings, hub: StatsHub) -> Self {
        Self {
            circuits: DashMap::new(),
            defaults: ArcSwap::from_pointee(defaults),
            hub,
        }
    }

    pub fn hub(&self) -> &StatsHub {
        &self.hub
    }

    pub fn defaults(&self) -> Arc<BreakerSettings> {
        self.defaults.load_full()
    }

    /// Replace the defaults used for breakers registered from now on.
    pub fn set_defaults(&self, defaults: BreakerSettings) {
        self.defaults.store(Arc::new(defaults));
        tracing::info!("Breaker defaults updated");
    }

    pub fn find(&self, identity: &Identity) -> Option<Arc<dyn Circuit>> {
        self.circuits.get(identity).map(|entry| entry.value().clone())
    }

    /// Typed lookup.
    pub fn breaker<A, T, E>(&self, identity: &Identity) -> Result<Option<Breaker<A, T, E>>, RegistrationError>
    where
        A: 'static,
        T: 'static,
        E: 'static,
    {
        match self.find(identity) {
            None => Ok(None),
            Some(circuit) => downcast(circuit.as_ref()).map(Some),
        }
    }

    /// Return the registered circuit, or build and store one.
    ///
    /// The second value is `true` when `make` ran. `make` runs at most once per
    /// identity even under concurrent callers.
    pub fn find_or_create<F>(
        &self,
        identity: Identity,
        make: F,
    ) -> Result<(Arc<dyn Circuit>, bool), RegistrationError>
    where
        F: FnOnce() -> Result<Arc<dyn Circuit>, RegistrationError>,
    {
        match self.circuits.entry(identity) {
            Entry::Occupied(entry) => Ok((entry.get().clone(), false)),
            Entry::Vacant(entry) => {
                let circuit = make()?;
                entry.insert(circuit.clone());
                Ok((circuit, true))
            }
        }
    }

    /// Replace the callbacks of an existing breaker. `Ok(false)` when absent.
    pub fn update<A, T, E>(
        &self,
        identity: &Identity,
        callbacks: Callbacks<A, T, E>,
    ) -> Result<bool, RegistrationError>
    where
        A: Clone + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        match self.breaker::<A, T, E>(identity)? {
            Some(breaker) => {
                breaker.replace_callbacks(callbacks);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Register `options` and return the breaker to call through.
    ///
    /// First registration merges the options over the current defaults and
    /// creates the breaker. Later registrations of the same identity only swap
    /// callbacks; setting overrides are ignored and statistics are kept.
    pub fn wrap<A, T, E>(&self, options: BreakerOptions<A, T, E>) -> Result<Breaker<A, T, E>, RegistrationError>
    where
        A: Clone + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (identity, overrides, callbacks) = options.into_parts()?;
        let settings = overrides.apply(&self.defaults());

        let mut pending = Some(callbacks);
        let (circuit, created) = self.find_or_create(identity.clone(), || {
            let callbacks = pending.take().ok_or_else(|| RegistrationError::MissingRun(identity.to_string()))?;
            let breaker = Breaker::new(identity.clone(), settings, callbacks, self.hub.clone())?;
            Ok(Arc::new(breaker) as Arc<dyn Circuit>)
        })?;

        let breaker = downcast::<A, T, E>(circuit.as_ref())?;
        if created {
            tracing::info!(circuit = %identity, "Circuit registered");
        } else if let Some(callbacks) = pending {
            breaker.replace_callbacks(callbacks);
            tracing::debug!(circuit = %identity, "Circuit updated");
        }
        Ok(breaker)
    }

    pub fn circuits(&self) -> Vec<Arc<dyn Circuit>> {
        self.circuits.iter().map(|entry| entry.value().clone()).collect()
    }

    /// `group → name → circuit`, both levels sorted.
    pub fn by_group(&self) -> GroupedCircuits {
        let mut grouped = GroupedCircuits::new();
        for entry in self.circuits.iter() {
            let identity = entry.key();
            grouped
                .entry(identity.group().to_string())
                .or_default()
                .insert(identity.name().to_string(), entry.value().clone());
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(BreakerSettings::default(), StatsHub::default())
    }
}

fn downcast<A, T, E>(circuit: &dyn Circuit) -> Result<Breaker<A, T, E>, RegistrationError>
where
    A: 'static,
    T: 'static,
    E: 'static,
{
    circuit
        .as_any()
        .downcast_ref::<Breaker<A, T, E>>()
        .cloned()
        .ok_or_else(|| RegistrationError::SignatureMismatch(circuit.identity().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::state::CircuitState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn options(name: &str, reply: u32) -> BreakerOptions<(), u32, String> {
        BreakerOptions::new(name).group("api").run(move |_| async move { Ok(reply) })
    }

    #[test]
    fn test_identity_display_and_default_group() {
        let identity = Identity::named("users");
        assert_eq!(identity.group(), DEFAULT_GROUP);
        assert_eq!(identity.to_string(), "default/users");
        assert_eq!(identity.key(), "usersdefault");
        assert_ne!(Identity::new("ab", "c"), Identity::new("a", "bc"));
    }

    #[tokio::test]
    async fn test_wrap_creates_then_updates() {
        let registry = Registry::default();
        let first = registry.wrap(options("users", 1)).unwrap();
        assert_eq!(first.execute(()).await.unwrap(), 1);

        let second = registry.wrap(options("users", 2)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(second.execute(()).await.unwrap(), 2);
        // Both handles share one breaker and one window.
        assert_eq!(first.execute(()).await.unwrap(), 2);
        assert_eq!(first.snapshot().requests(), 3);
    }

    #[tokio::test]
    async fn test_update_keeps_settings_and_state() {
        let registry = Registry::default();
        let breaker = registry
            .wrap(
                BreakerOptions::<(), u32, String>::new("flaky")
                    .run(|_| async { Err("down".to_string()) })
                    .wait_threshold(3),
            )
            .unwrap();
        for _ in 0..3 {
            let _ = breaker.execute(()).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let updated = registry
            .wrap(
                BreakerOptions::<(), u32, String>::new("flaky")
                    .run(|_| async { Ok(7) })
                    .wait_threshold(1_000),
            )
            .unwrap();
        assert_eq!(updated.state(), CircuitState::Open);
        assert_eq!(updated.settings().wait_threshold, 3);
        assert_eq!(updated.snapshot().totals.failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_added_while_open_recovers_without_traffic() {
        let registry = Registry::default();
        let breaker = registry
            .wrap(
                BreakerOptions::<(), u32, String>::new("search")
                    .run(|_| async { Err("down".to_string()) })
                    .wait_threshold(3)
                    .circuit_duration(Duration::from_secs(5))
                    .health_check_interval(Duration::from_millis(500)),
            )
            .unwrap();
        for _ in 0..3 {
            let _ = breaker.execute(()).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let checks = Arc::new(AtomicUsize::new(0));
        let counter = checks.clone();
        registry
            .wrap(
                BreakerOptions::<(), u32, String>::new("search")
                    .run(|_| async { Ok(1) })
                    .health_check(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        async { Ok(()) }
                    }),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_missing_circuit() {
        let registry = Registry::default();
        let callbacks = Callbacks::new(crate::resilience::operation::operation(|_: ()| async {
            Ok::<u32, String>(1)
        }));
        assert_eq!(registry.update(&Identity::named("ghost"), callbacks), Ok(false));
    }

    #[test]
    fn test_signature_mismatch() {
        let registry = Registry::default();
        registry.wrap(options("users", 1)).unwrap();

        let other = BreakerOptions::<String, String, String>::new("users")
            .group("api")
            .run(|s| async move { Ok(s) });
        assert_eq!(
            registry.wrap(other).unwrap_err(),
            RegistrationError::SignatureMismatch("api/users".to_string())
        );
    }

    #[test]
    fn test_invalid_settings_not_registered() {
        let registry = Registry::default();
        let err = registry.wrap(options("users", 1).threshold(0.0)).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidSettings { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_defaults_apply_to_new_registrations() {
        let registry = Registry::default();
        registry.set_defaults(BreakerSettings {
            timeout: Duration::from_millis(250),
            ..Default::default()
        });
        let breaker = registry.wrap(options("users", 1)).unwrap();
        assert_eq!(breaker.settings().timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_concurrent_find_or_create_builds_once() {
        let registry = Registry::default();
        let built = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    registry
                        .find_or_create(Identity::named("shared"), || {
                            built.fetch_add(1, Ordering::SeqCst);
                            let breaker = Breaker::new(
                                Identity::named("shared"),
                                BreakerSettings::default(),
                                Callbacks::new(crate::resilience::operation::operation(|_: ()| async {
                                    Ok::<(), String>(())
                                })),
                                registry.hub().clone(),
                            )?;
                            Ok(Arc::new(breaker) as Arc<dyn Circuit>)
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_grouped_index() {
        let registry = Registry::default();
        registry.wrap(options("users", 1)).unwrap();
        registry.wrap(options("orders", 1)).unwrap();
        registry
            .wrap(BreakerOptions::<(), u32, String>::new("ping").run(|_| async { Ok(0) }))
            .unwrap();

        let grouped = registry.by_group();
        let groups: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(groups, vec!["api".to_string(), "default".to_string()]);
        let names: Vec<_> = grouped["api"].keys().cloned().collect();
        assert_eq!(names, vec!["orders".to_string(), "users".to_string()]);
        assert_eq!(grouped["default"]["ping"].identity(), &Identity::named("ping"));
    }
}
