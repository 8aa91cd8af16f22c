use std::fs;
use std::io;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use log::{debug, error, info};

use crate::config::PathSet;

use super::config::Config;

pub type OnChangeHook = Box<dyn Fn(&Config) -> Result<()> + Send + Sync>;

/// Polls the configuration file and hands every new, valid configuration to
/// the registered hooks.
pub struct ConfigWatcher {
    ps: PathSet,
    interval: Duration,
    hooks: Vec<OnChangeHook>,

    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(ps: PathSet, interval: Duration) -> Self {
        let last_modified = modified_time(&ps).unwrap_or_default();
        Self {
            ps,
            interval,
            hooks: Vec::new(),
            last_modified,
        }
    }

    pub fn add_on_change_hook<F>(&mut self, hook: F)
    where
        F: Fn(&Config) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Reload the configuration when the file changed since the last check.
    /// Returns whether the hooks ran. A file that fails to load is not
    /// retried until it changes again.
    pub fn check(&mut self) -> Result<bool> {
        let modified = modified_time(&self.ps)?;
        if modified == self.last_modified {
            return Ok(false);
        }
        self.last_modified = modified;

        debug!(
            "Config file '{}' changed, reloading",
            self.ps.config_file.display()
        );
        let cfg: Config = self.ps.load_config().context("reload config")?;
        for hook in self.hooks.iter() {
            hook(&cfg)?;
        }
        Ok(true)
    }

    pub async fn run(mut self) {
        info!(
            "Config watcher starting, file: '{}', interval: {}s",
            self.ps.config_file.display(),
            self.interval.as_secs()
        );
        let mut tk = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        tk.tick().await;
        loop {
            let _ = tk.tick().await;
            // Reading the file and rebuilding the providers block.
            let joined = tokio::task::spawn_blocking(move || {
                let result = self.check();
                (self, result)
            })
            .await;
            let result = match joined {
                Ok((watcher, result)) => {
                    self = watcher;
                    result
                }
                Err(e) => {
                    error!("Config watcher task failed, stop watching: {e}");
                    return;
                }
            };
            match result {
                Ok(true) => info!("Config reloaded"),
                Ok(false) => {}
                Err(e) => error!("Reload config failed, keep serving the previous one: {e:#}"),
            }
        }
    }
}

fn modified_time(ps: &PathSet) -> Result<Option<SystemTime>> {
    match fs::metadata(&ps.config_file) {
        Ok(meta) => {
            let modified = meta.modified().context("read config file modified time")?;
            Ok(Some(modified))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| {
            format!("stat config file: {}", ps.config_file.display())
        }),
    }
}
