//! Hot reload of the relay configuration file.
//!
//! Every modify/create event re-reads and validates the file. A config that
//! differs from the controller's current one is stored for the next
//! `start()`; an invalid file is logged and the current config is kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_config;
use crate::lifecycle::LifecycleController;

/// Applies configuration file changes to a lifecycle controller.
pub struct ConfigWatcher {
    path: PathBuf,
    controller: Arc<LifecycleController>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, controller: Arc<LifecycleController>) -> Self {
        Self {
            path: path.to_path_buf(),
            controller,
        }
    }

    /// Start watching. Updates flow for as long as the returned watcher lives.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let poll = Config::default().with_poll_interval(Duration::from_secs(2));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => self.reload(),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            poll,
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }

    fn reload(&self) {
        match load_config(&self.path) {
            Ok(config) if *self.controller.config() == config => {
                tracing::debug!(path = %self.path.display(), "Config file touched, contents unchanged");
            }
            Ok(config) => self.controller.update_config(config),
            Err(e) => tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Config reload rejected, keeping current configuration"
            ),
        }
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}
