//! Hot reload of the config file.
//!
//! Only `[defaults]` takes effect on a running server (breakers registered
//! afterwards pick it up). Changes to any other section are reported and wait
//! for a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::CircuitConfig;

/// Sections applied without a restart.
const LIVE_SECTIONS: &[&str] = &["defaults"];

/// Names of the top-level sections that differ between two configs.
pub fn changed_sections(old: &CircuitConfig, new: &CircuitConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.server != new.server {
        changed.push("server");
    }
    if old.stream != new.stream {
        changed.push("stream");
    }
    if old.defaults != new.defaults {
        changed.push("defaults");
    }
    if old.observability != new.observability {
        changed.push("observability");
    }
    if old.admin != new.admin {
        changed.push("admin");
    }
    changed
}

/// Re-reads the file and diffs it against the last accepted version.
struct Reloader {
    path: PathBuf,
    current: CircuitConfig,
}

impl Reloader {
    /// `Ok(None)` when the file parsed but nothing changed.
    fn reload(&mut self) -> Result<Option<(CircuitConfig, Vec<&'static str>)>, ConfigError> {
        let next = load_config(&self.path)?;
        let changed = changed_sections(&self.current, &next);
        if changed.is_empty() {
            return Ok(None);
        }
        self.current = next.clone();
        Ok(Some((next, changed)))
    }

    fn on_event(&mut self, tx: &mpsc::UnboundedSender<CircuitConfig>) {
        match self.reload() {
            Ok(Some((config, changed))) => {
                let restart: Vec<_> = changed.iter().filter(|s| !LIVE_SECTIONS.contains(*s)).collect();
                tracing::info!(path = ?self.path, sections = ?changed, "Config reloaded");
                if !restart.is_empty() {
                    tracing::warn!(sections = ?restart, "Changed sections apply after restart");
                }
                let _ = tx.send(config);
            }
            Ok(None) => tracing::debug!(path = ?self.path, "Config file touched, no changes"),
            Err(e) => tracing::error!(path = ?self.path, error = %e, "Config reload rejected, keeping current"),
        }
    }
}

/// Watches the config file and sends every valid, changed version.
pub struct ConfigWatcher {
    reloader: Reloader,
    update_tx: mpsc::UnboundedSender<CircuitConfig>,
}

impl ConfigWatcher {
    /// `current` is the config the process started with.
    pub fn new(path: &Path, current: CircuitConfig) -> (Self, mpsc::UnboundedReceiver<CircuitConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let reloader = Reloader {
            path: path.to_path_buf(),
            current,
        };
        (Self { reloader, update_tx }, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, ConfigError> {
        let Self { mut reloader, update_tx } = self;
        let path = reloader.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => reloader.on_event(&update_tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch failed"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(ConfigError::Watch)?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(ConfigError::Watch)?;

        tracing::info!(path = ?path, "Watching config for changes");
        Ok(watcher)
    }
}
