use std::collections::HashMap;

use anyhow::{bail, Result};

/// Lowercase `host` and drop its port. IPv6 literals keep their brackets.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host,
        }
    };
    host.to_lowercase()
}

enum HostPattern {
    Any,
    /// Includes the leading dot, `.example.com` for `*.example.com`.
    Suffix(String),
    Exact(String),
}

impl HostPattern {
    fn parse(host: &str) -> Self {
        let host = host.trim().to_lowercase();
        if host.is_empty() || host == "*" {
            return Self::Any;
        }
        if let Some(suffix) = host.strip_prefix('*') {
            return Self::Suffix(suffix.to_string());
        }
        Self::Exact(normalize_host(&host))
    }
}

/// Dispatches on the request host. Exact hosts win over `*.suffix` patterns,
/// which win over the catch-all `*`.
pub struct HostRouter<R> {
    exact: HashMap<String, R>,
    /// Longest suffix first.
    suffixes: Vec<(String, R)>,
    wildcard: Option<R>,
}

impl<R> HostRouter<R> {
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            suffixes: Vec::new(),
            wildcard: None,
        }
    }

    /// Register `router` for the host pattern, replacing any router already
    /// there. An empty host is the catch-all.
    pub fn register(&mut self, host: &str, router: R) {
        match HostPattern::parse(host) {
            HostPattern::Any => self.wildcard = Some(router),
            HostPattern::Exact(host) => {
                self.exact.insert(host, router);
            }
            HostPattern::Suffix(suffix) => {
                self.suffixes.retain(|(s, _)| *s != suffix);
                let pos = self
                    .suffixes
                    .partition_point(|(s, _)| s.len() >= suffix.len());
                self.suffixes.insert(pos, (suffix, router));
            }
        }
    }

    /// The router registered for the host pattern, created with `init` when
    /// missing. Used to merge the mounts sharing a host.
    pub fn get_or_insert_with(&mut self, host: &str, init: impl FnOnce() -> R) -> &mut R {
        match HostPattern::parse(host) {
            HostPattern::Any => self.wildcard.get_or_insert_with(init),
            HostPattern::Exact(host) => self.exact.entry(host).or_insert_with(init),
            HostPattern::Suffix(suffix) => {
                let pos = match self.suffixes.iter().position(|(s, _)| *s == suffix) {
                    Some(pos) => pos,
                    None => {
                        let pos = self
                            .suffixes
                            .partition_point(|(s, _)| s.len() >= suffix.len());
                        self.suffixes.insert(pos, (suffix, init()));
                        pos
                    }
                };
                &mut self.suffixes[pos].1
            }
        }
    }

    /// The router serving `host` (a `Host` header value, port allowed).
    pub fn resolve(&self, host: &str) -> Option<&R> {
        let host = normalize_host(host);
        if let Some(router) = self.exact.get(&host) {
            return Some(router);
        }
        for (suffix, router) in self.suffixes.iter() {
            if host.ends_with(suffix.as_str()) {
                return Some(router);
            }
        }
        self.wildcard.as_ref()
    }
}

/// A route found by [`PathRouter::find`].
#[derive(Debug)]
pub struct PathMatch<'a, T> {
    /// Mount path without trailing slash, empty for the root mount.
    pub mount: &'a str,
    pub route: &'a T,
    /// The rest of the request path after the mount and its slash.
    pub rest: &'a str,
}

/// Dispatches on the request path prefix. The longest mount path wins.
pub struct PathRouter<T> {
    /// Longest path first.
    mounts: Vec<(String, T)>,
}

impl<T> PathRouter<T> {
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    pub fn insert(&mut self, path: &str, route: T) -> Result<()> {
        let path = path.trim_end_matches('/').to_string();
        if self.mounts.iter().any(|(p, _)| *p == path) {
            let display = if path.is_empty() { "/" } else { path.as_str() };
            bail!("duplicate mount path '{display}'");
        }
        let pos = self.mounts.partition_point(|(p, _)| p.len() >= path.len());
        self.mounts.insert(pos, (path, route));
        Ok(())
    }

    pub fn find<'a>(&'a self, path: &'a str) -> Option<PathMatch<'a, T>> {
        for (mount, route) in self.mounts.iter() {
            let Some(rest) = path.strip_prefix(mount.as_str()) else {
                continue;
            };
            let rest = if rest.is_empty() {
                rest
            } else if let Some(rest) = rest.strip_prefix('/') {
                rest
            } else {
                // `/filesystem` is not under `/files`.
                continue;
            };
            return Some(PathMatch {
                mount: mount.as_str(),
                route,
                rest,
            });
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}
