use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

/// A protected (or explicitly public) path pattern inside a target.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResourceConfig {
    /// Glob matched against the full request path, `*` and `?` supported.
    pub path: String,

    #[serde(default = "ResourceConfig::default_methods")]
    pub methods: Vec<String>,

    /// Serve the resource without authentication. Cannot be combined with
    /// `basic` or `oidc`.
    #[serde(default)]
    pub whitelist: Option<bool>,

    /// Name of the auth provider, of the same kind as the mode below.
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub basic: Option<BasicResourceConfig>,

    #[serde(default)]
    pub oidc: Option<OidcResourceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BasicResourceConfig {
    #[serde(default)]
    pub credentials: Vec<BasicCredentialConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BasicCredentialConfig {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OidcResourceConfig {
    /// An empty list lets every authenticated user in.
    #[serde(default)]
    pub authorization_accesses: Vec<AccessConfig>,
}

/// One authorization rule, matching a group, an email, both, or anyone when
/// neither is set.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AccessConfig {
    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Treat `group` and `email` as regular expressions.
    #[serde(default)]
    pub regexp: bool,
}

const METHODS: [&str; 3] = ["GET", "PUT", "DELETE"];

impl CommonConfig for ResourceConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            methods: Self::default_methods(),
            whitelist: None,
            provider: None,
            basic: None,
            oidc: None,
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.path.is_empty() {
            bail!("resource path cannot be empty");
        }
        if !self.path.starts_with('/') {
            bail!("resource path '{}' should start with '/'", self.path);
        }

        if self.methods.is_empty() {
            self.methods = Self::default_methods();
        }
        for method in self.methods.iter_mut() {
            *method = method.to_uppercase();
            if !METHODS.contains(&method.as_str()) {
                bail!("unsupported method '{method}' in resource '{}'", self.path);
            }
        }

        let whitelist = self.whitelist.unwrap_or(false);
        match (whitelist, self.basic.is_some(), self.oidc.is_some()) {
            (true, false, false) => {}
            (true, _, _) => bail!(
                "resource '{}' is whitelisted and cannot have an authentication",
                self.path
            ),
            (false, true, true) => bail!(
                "resource '{}' cannot use both basic and oidc authentication",
                self.path
            ),
            (false, false, false) => bail!(
                "resource '{}' should be whitelisted or have an authentication",
                self.path
            ),
            (false, _, _) => {
                let provider = self.provider.as_deref().unwrap_or_default();
                if provider.is_empty() {
                    bail!("resource '{}' requires an auth provider", self.path);
                }
            }
        }

        if let Some(basic) = self.basic.as_mut() {
            if basic.credentials.is_empty() {
                bail!("basic resource '{}' has no credentials", self.path);
            }
            for cred in basic.credentials.iter_mut() {
                if cred.user.is_empty() {
                    bail!("basic credential user cannot be empty");
                }
                cred.password = expandenv("password", &cred.password)?;
                if cred.password.is_empty() {
                    bail!("basic credential password for '{}' is empty", cred.user);
                }
            }
        }

        if let Some(oidc) = self.oidc.as_ref() {
            for access in oidc.authorization_accesses.iter() {
                access.validate()?;
            }
        }

        Ok(())
    }
}

impl ResourceConfig {
    pub fn default_methods() -> Vec<String> {
        vec![String::from("GET")]
    }
}

impl AccessConfig {
    fn validate(&self) -> Result<()> {
        let fields = [("group", &self.group), ("email", &self.email)];
        if !self.regexp {
            return Ok(());
        }
        for (name, value) in fields {
            if let Some(value) = value {
                Regex::new(value)
                    .with_context(|| format!("invalid {name} regexp '{value}'"))?;
            }
        }
        Ok(())
    }
}
