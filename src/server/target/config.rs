use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};
use crate::server::render::config::TemplatesConfig;
use crate::server::resource::config::ResourceConfig;
use crate::server::storage::config::BucketConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TargetConfig {
    pub name: String,

    #[serde(default = "BucketConfig::default")]
    pub bucket: BucketConfig,

    #[serde(default = "MountConfig::default")]
    pub mount: MountConfig,

    #[serde(default = "ActionsConfig::default")]
    pub actions: ActionsConfig,

    /// Target level template overrides. The target list template is never
    /// read from here.
    #[serde(default = "TemplatesConfig::default")]
    pub templates: TemplatesConfig,

    /// Checked in order, the first match wins.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MountConfig {
    /// Exact host, `*.suffix` or `*`. Empty means `*`.
    #[serde(default = "MountConfig::default_host")]
    pub host: String,

    #[serde(default = "MountConfig::default_paths")]
    pub paths: Vec<String>,
}

/// Enabled verbs. A disabled verb is not routed at all.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ActionsConfig {
    #[serde(default = "ActionsConfig::default_get")]
    pub get: bool,

    #[serde(default)]
    pub put: bool,

    #[serde(default)]
    pub delete: bool,
}

/// The aggregate endpoint listing every target.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListTargetsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "MountConfig::default")]
    pub mount: MountConfig,

    #[serde(default)]
    pub resource: Option<ResourceConfig>,
}

impl CommonConfig for TargetConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            bucket: BucketConfig::default(),
            mount: MountConfig::default(),
            actions: ActionsConfig::default(),
            templates: TemplatesConfig::default(),
            resources: Vec::new(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.name.is_empty() {
            bail!("target name cannot be empty");
        }
        self.bucket.complete(ps).context("validate bucket")?;
        self.mount.complete(ps).context("validate mount")?;
        self.templates.complete(ps).context("validate templates")?;
        if self.templates.target_list.take().is_some() {
            bail!("target list template cannot be overridden by a target");
        }
        for res in self.resources.iter_mut() {
            res.complete(ps)?;
        }
        Ok(())
    }
}

impl CommonConfig for MountConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            paths: Self::default_paths(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.host = self.host.trim().to_lowercase();
        if self.host.is_empty() {
            self.host = String::from("*");
        }
        if self.host.chars().skip(1).any(|c| c == '*') {
            bail!("invalid mount host '{}'", self.host);
        }
        if self.host.starts_with('*') && self.host != "*" && !self.host.starts_with("*.") {
            bail!("invalid mount host '{}', expect '*.suffix'", self.host);
        }

        if self.paths.is_empty() {
            bail!("mount should have at least one path");
        }
        let mut seen = HashSet::with_capacity(self.paths.len());
        for path in self.paths.iter_mut() {
            if !path.starts_with('/') {
                bail!("mount path '{path}' should start with '/'");
            }
            *path = Self::normalize_path(path);
            if !seen.insert(path.clone()) {
                bail!("duplicate mount path '{path}'");
            }
        }
        Ok(())
    }
}

impl MountConfig {
    pub fn default_host() -> String {
        String::from("*")
    }

    pub fn default_paths() -> Vec<String> {
        vec![String::from("/")]
    }

    /// `/files/` becomes `/files`, the root stays `/`.
    pub fn normalize_path(path: &str) -> String {
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return String::from("/");
        }
        path.to_string()
    }
}

impl CommonConfig for ActionsConfig {
    fn default() -> Self {
        Self {
            get: Self::default_get(),
            put: false,
            delete: false,
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        Ok(())
    }
}

impl ActionsConfig {
    pub fn default_get() -> bool {
        true
    }
}

impl CommonConfig for ListTargetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mount: MountConfig::default(),
            resource: None,
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.mount.complete(ps).context("validate list targets mount")?;
        if let Some(res) = self.resource.as_mut() {
            res.complete(ps).context("validate list targets resource")?;
        }
        Ok(())
    }
}
