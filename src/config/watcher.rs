//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::ScopeConfig;
use crate::observer::DefaultObserver;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: Option<ScopeConfig>,
    update_tx: mpsc::UnboundedSender<ScopeConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ScopeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                current: None,
                update_tx,
            },
            update_rx,
        )
    }

    /// The configuration already in effect; reloads equal to it are not forwarded.
    pub fn with_current(mut self, config: ScopeConfig) -> Self {
        self.current = Some(config);
        self
    }

    /// Start watching the file in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let mut current = self.current;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        if let Some(config) = reload(&path, &mut current) {
                            let _ = tx.send(config);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and return the result if it is valid and differs from `current`.
fn reload(path: &Path, current: &mut Option<ScopeConfig>) -> Option<ScopeConfig> {
    match load_config(path) {
        Ok(config) if current.as_ref() == Some(&config) => {
            tracing::debug!("Config unchanged, nothing to apply");
            None
        }
        Ok(config) => {
            *current = Some(config.clone());
            Some(config)
        }
        Err(e) => {
            tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
            None
        }
    }
}

/// Apply every received `[observer]` section to `observer` until the channel closes.
pub fn spawn_observer_reload(
    mut updates: mpsc::UnboundedReceiver<ScopeConfig>,
    observer: Arc<DefaultObserver>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            tracing::info!(
                enabled = config.observer.enabled,
                log_connect = config.observer.log_connect,
                log_close = config.observer.log_close,
                "Applying observer configuration"
            );
            observer.apply(config.observer);
        }
    })
}
