use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

/// Named authentication providers, referenced by resources.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthProvidersConfig {
    #[serde(default)]
    pub basic: BTreeMap<String, BasicProviderConfig>,

    #[serde(default)]
    pub oidc: BTreeMap<String, OidcProviderConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BasicProviderConfig {
    #[serde(default = "BasicProviderConfig::default_realm")]
    pub realm: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OidcProviderConfig {
    /// Expected `iss` claim.
    pub issuer_url: String,

    /// Expected `aud` claim, the audience is not checked when empty.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "OidcProviderConfig::default_algorithm")]
    pub algorithm: String,

    /// PEM public key, for the RS*, PS* and ES* algorithms.
    #[serde(default)]
    pub public_key_path: Option<String>,

    /// Shared secret, for the HS* algorithms.
    #[serde(default)]
    pub secret: Option<String>,

    /// Where to send unauthenticated clients. Without it they get a 401.
    #[serde(default)]
    pub login_url: Option<String>,

    #[serde(default = "OidcProviderConfig::default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "OidcProviderConfig::default_email_claim")]
    pub email_claim: String,

    #[serde(default = "OidcProviderConfig::default_groups_claim")]
    pub groups_claim: String,
}

impl CommonConfig for AuthProvidersConfig {
    fn default() -> Self {
        Self {
            basic: BTreeMap::new(),
            oidc: BTreeMap::new(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        for (name, cfg) in self.oidc.iter_mut() {
            if self.basic.contains_key(name) {
                bail!("auth provider name '{name}' is used by both basic and oidc");
            }
            cfg.complete(ps)
                .with_context(|| format!("validate oidc provider '{name}'"))?;
        }
        for (name, cfg) in self.basic.iter() {
            if cfg.realm.is_empty() {
                bail!("basic provider '{name}' realm cannot be empty");
            }
        }
        Ok(())
    }
}

impl AuthProvidersConfig {
    pub fn has_basic(&self, name: &str) -> bool {
        self.basic.contains_key(name)
    }

    pub fn has_oidc(&self, name: &str) -> bool {
        self.oidc.contains_key(name)
    }
}

impl BasicProviderConfig {
    pub fn default_realm() -> String {
        String::from("Authentication Required")
    }
}

impl OidcProviderConfig {
    pub fn default_algorithm() -> String {
        String::from("RS256")
    }

    pub fn default_cookie_name() -> String {
        String::from("oidc")
    }

    pub fn default_email_claim() -> String {
        String::from("email")
    }

    pub fn default_groups_claim() -> String {
        String::from("groups")
    }

    pub fn parse_algorithm(&self) -> Result<Algorithm> {
        Algorithm::from_str(&self.algorithm)
            .with_context(|| format!("unsupported jwt algorithm '{}'", self.algorithm))
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.issuer_url = expandenv("issuer_url", &self.issuer_url)?;
        if self.issuer_url.is_empty() {
            bail!("issuer_url cannot be empty");
        }
        self.client_id = match self.client_id.take() {
            Some(id) => Some(expandenv("client_id", id)?).filter(|id| !id.is_empty()),
            None => None,
        };
        self.login_url = self.login_url.take().filter(|url| !url.is_empty());
        for (name, value) in [
            ("cookie_name", &self.cookie_name),
            ("email_claim", &self.email_claim),
            ("groups_claim", &self.groups_claim),
        ] {
            if value.is_empty() {
                bail!("{name} cannot be empty");
            }
        }

        match self.parse_algorithm()? {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = match self.secret.take() {
                    Some(secret) => expandenv("secret", secret)?,
                    None => String::new(),
                };
                if secret.is_empty() {
                    bail!("secret is required for algorithm {}", self.algorithm);
                }
                self.secret = Some(secret);
            }
            _ => {
                let path = match self.public_key_path.take() {
                    Some(path) => expandenv("public_key_path", path)?,
                    None => String::new(),
                };
                if path.is_empty() {
                    bail!("public_key_path is required for algorithm {}", self.algorithm);
                }
                self.public_key_path = Some(format!("{}", ps.resolve(path).display()));
            }
        }
        Ok(())
    }
}
