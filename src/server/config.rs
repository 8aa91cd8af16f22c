use std::collections::{HashMap, HashSet};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};
use crate::logs::LogsConfig;

use super::authn::config::AuthProvidersConfig;
use super::render::config::TemplatesConfig;
use super::resource::config::ResourceConfig;
use super::target::config::{ListTargetsConfig, TargetConfig};

/// The whole configuration file.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "ServerConfig::default")]
    pub server: ServerConfig,

    #[serde(default = "LogsConfig::default")]
    pub logs: LogsConfig,

    #[serde(default = "TemplatesConfig::default")]
    pub templates: TemplatesConfig,

    #[serde(default = "ListTargetsConfig::default")]
    pub list_targets: ListTargetsConfig,

    #[serde(default = "AuthProvidersConfig::default")]
    pub auth_providers: AuthProvidersConfig,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Listener settings. They are read once at startup, a reload ignores them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default = "ServerConfig::default_ssl")]
    pub ssl: bool,

    #[serde(default = "ServerConfig::default_cert_path")]
    pub cert_path: String,

    #[serde(default = "ServerConfig::default_key_path")]
    pub key_path: String,

    #[serde(default = "ServerConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "ServerConfig::default_workers")]
    pub workers: u64,

    /// Maximum size of a PUT request body.
    #[serde(default = "ServerConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    /// How often the config file is checked for changes, 0 disables the hot
    /// reload.
    #[serde(default = "ServerConfig::default_reload_interval_secs")]
    pub reload_interval_secs: u64,
}

impl CommonConfig for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logs: LogsConfig::default(),
            templates: TemplatesConfig::default(),
            list_targets: ListTargetsConfig::default(),
            auth_providers: AuthProvidersConfig::default(),
            targets: Vec::new(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.server.complete(ps).context("server")?;
        self.logs.complete(ps).context("logs")?;
        self.templates.complete(ps).context("templates")?;
        self.list_targets.complete(ps).context("list_targets")?;
        self.auth_providers.complete(ps).context("auth_providers")?;

        let mut names = HashSet::with_capacity(self.targets.len());
        for target in self.targets.iter_mut() {
            target
                .complete(ps)
                .with_context(|| format!("target '{}'", target.name))?;
            if !names.insert(target.name.clone()) {
                bail!("duplicate target name '{}'", target.name);
            }
            for res in target.resources.iter() {
                self.auth_providers
                    .check_resource(res)
                    .with_context(|| format!("target '{}'", target.name))?;
            }
        }
        if self.list_targets.enabled {
            if let Some(res) = self.list_targets.resource.as_ref() {
                self.auth_providers
                    .check_resource(res)
                    .context("list_targets")?;
            }
        }

        self.check_mounts()
    }
}

impl Config {
    /// Two mounts on the same host cannot share a path.
    fn check_mounts(&self) -> Result<()> {
        let mut mounts: HashMap<(&str, &str), &str> = HashMap::new();
        let list_targets = self
            .list_targets
            .enabled
            .then_some(("list_targets", &self.list_targets.mount));
        let targets = self
            .targets
            .iter()
            .map(|target| (target.name.as_str(), &target.mount));

        for (owner, mount) in list_targets.into_iter().chain(targets) {
            for path in mount.paths.iter() {
                let key = (mount.host.as_str(), path.as_str());
                if let Some(other) = mounts.insert(key, owner) {
                    bail!(
                        "mount path '{path}' on host '{}' is used by both '{other}' and '{owner}'",
                        mount.host
                    );
                }
            }
        }
        Ok(())
    }
}

impl AuthProvidersConfig {
    /// The provider named by `res` must exist and match its mode.
    fn check_resource(&self, res: &ResourceConfig) -> Result<()> {
        let Some(provider) = res.provider.as_deref() else {
            return Ok(());
        };
        if res.basic.is_some() && !self.has_basic(provider) {
            bail!(
                "basic auth provider '{provider}' of resource '{}' not found",
                res.path
            );
        }
        if res.oidc.is_some() && !self.has_oidc(provider) {
            bail!(
                "oidc auth provider '{provider}' of resource '{}' not found",
                res.path
            );
        }
        Ok(())
    }
}

impl CommonConfig for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: Self::default_ssl(),
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
            keep_alive_secs: Self::default_keep_alive_secs(),
            workers: Self::default_workers(),
            payload_limit_mib: Self::default_payload_limit_mib(),
            reload_interval_secs: Self::default_reload_interval_secs(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        if self.ssl {
            self.cert_path = expandenv("cert_path", &self.cert_path)?;
            if self.cert_path.is_empty() {
                bail!("cert_path is required when ssl is enabled");
            }
            self.cert_path = format!("{}", ps.resolve(&self.cert_path).display());

            self.key_path = expandenv("key_path", &self.key_path)?;
            if self.key_path.is_empty() {
                bail!("key_path is required when ssl is enabled");
            }
            self.key_path = format!("{}", ps.resolve(&self.key_path).display());
        }

        if self.payload_limit_mib < Self::MIN_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be greater than or equal to {}",
                Self::MIN_PAYLOAD_LIMIT_MIB
            );
        }
        if self.payload_limit_mib > Self::MAX_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be less than or equal to {}",
                Self::MAX_PAYLOAD_LIMIT_MIB
            );
        }

        Ok(())
    }
}

impl ServerConfig {
    const MAX_PAYLOAD_LIMIT_MIB: usize = 1024;
    const MIN_PAYLOAD_LIMIT_MIB: usize = 1;

    pub fn default_bind() -> String {
        String::from("127.0.0.1:8080")
    }

    pub fn default_ssl() -> bool {
        false
    }

    pub fn default_cert_path() -> String {
        String::new()
    }

    pub fn default_key_path() -> String {
        String::new()
    }

    pub fn default_keep_alive_secs() -> u64 {
        0
    }

    pub fn default_workers() -> u64 {
        0
    }

    pub fn default_payload_limit_mib() -> usize {
        32
    }

    pub fn default_reload_interval_secs() -> u64 {
        5
    }

    pub fn payload_limit_bytes(&self) -> usize {
        self.payload_limit_mib * 1024 * 1024
    }
}
