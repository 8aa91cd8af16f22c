use anyhow::{Context, Result};
use regex::Regex;

use crate::server::resource::config::AccessConfig;

/// Matches a single claim value, literally or with an (unanchored) regular
/// expression.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Regex(Regex),
}

impl Matcher {
    pub fn new(value: &str, regexp: bool) -> Result<Self> {
        if !regexp {
            return Ok(Self::Exact(value.to_string()));
        }
        let re = Regex::new(value).with_context(|| format!("compile access regexp '{value}'"))?;
        Ok(Self::Regex(re))
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Exact(expect) => expect == value,
            Self::Regex(re) => re.is_match(value),
        }
    }
}

/// An OIDC authorization access. When both fields are set, the email and
/// one of the groups must match. A rule with neither field matches anyone.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub group: Option<Matcher>,
    pub email: Option<Matcher>,
}

impl AccessRule {
    pub fn from_config(cfg: &AccessConfig) -> Result<Self> {
        let group = match cfg.group.as_ref() {
            Some(group) => Some(Matcher::new(group, cfg.regexp)?),
            None => None,
        };
        let email = match cfg.email.as_ref() {
            Some(email) => Some(Matcher::new(email, cfg.regexp)?),
            None => None,
        };
        Ok(Self { group, email })
    }

    pub fn is_match(&self, email: &str, groups: &[String]) -> bool {
        if let Some(matcher) = self.email.as_ref() {
            if !matcher.is_match(email) {
                return false;
            }
        }
        if let Some(matcher) = self.group.as_ref() {
            if !groups.iter().any(|group| matcher.is_match(group)) {
                return false;
            }
        }
        true
    }
}

/// Whether any rule grants access. An empty rule list grants everyone.
pub fn is_authorized(rules: &[AccessRule], email: &str, groups: &[String]) -> bool {
    if rules.is_empty() {
        return true;
    }
    rules.iter().any(|rule| rule.is_match(email, groups))
}
