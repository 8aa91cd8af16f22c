pub mod config;

use actix_web::http::Method;
use anyhow::{bail, Context, Result};
use regex::Regex;

use super::authn::BasicCredential;
use super::authz::AccessRule;

use config::ResourceConfig;

/// Glob pattern over request paths. `*` matches any sequence (slashes
/// included), `?` a single character, everything else matches itself.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        let mut buf = [0u8; 4];
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                c => expr.push_str(&regex::escape(c.encode_utf8(&mut buf))),
            }
        }
        expr.push('$');

        let regex =
            Regex::new(&expr).with_context(|| format!("compile path pattern '{pattern}'"))?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Clone)]
pub enum ResourceAuth {
    Basic {
        provider: String,
        credentials: Vec<BasicCredential>,
    },
    Oidc {
        provider: String,
        accesses: Vec<AccessRule>,
    },
}

impl ResourceAuth {
    pub fn provider(&self) -> &str {
        match self {
            Self::Basic { provider, .. } | Self::Oidc { provider, .. } => provider,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub pattern: PathPattern,
    pub methods: Vec<Method>,
    pub whitelist: bool,
    /// `None` only for whitelisted resources.
    pub auth: Option<ResourceAuth>,
}

impl Resource {
    /// Build from a completed [`ResourceConfig`].
    pub fn from_config(cfg: &ResourceConfig) -> Result<Self> {
        let pattern = PathPattern::new(&cfg.path)?;
        let mut methods = Vec::with_capacity(cfg.methods.len());
        for method in cfg.methods.iter() {
            let method = Method::from_bytes(method.as_bytes())
                .with_context(|| format!("parse method '{method}'"))?;
            methods.push(method);
        }

        let whitelist = cfg.whitelist.unwrap_or(false);
        let provider = cfg.provider.clone().unwrap_or_default();
        let auth = match (whitelist, cfg.basic.as_ref(), cfg.oidc.as_ref()) {
            (true, None, None) => None,
            (false, Some(basic), None) => Some(ResourceAuth::Basic {
                provider,
                credentials: basic
                    .credentials
                    .iter()
                    .map(|cred| BasicCredential::new(&cred.user, &cred.password))
                    .collect(),
            }),
            (false, None, Some(oidc)) => {
                let accesses = oidc
                    .authorization_accesses
                    .iter()
                    .map(AccessRule::from_config)
                    .collect::<Result<Vec<_>>>()?;
                Some(ResourceAuth::Oidc { provider, accesses })
            }
            _ => bail!("invalid authentication for resource '{}'", cfg.path),
        };

        Ok(Self {
            pattern,
            methods,
            whitelist,
            auth,
        })
    }

    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.methods.contains(method) && self.pattern.is_match(path)
    }
}

/// The first resource, in declaration order, matching both the path and the
/// method. `None` means the request is not protected.
pub fn find_resource<'a>(
    resources: &'a [Resource],
    path: &str,
    method: &Method,
) -> Option<&'a Resource> {
    resources.iter().find(|res| res.matches(path, method))
}
