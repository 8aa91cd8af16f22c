use std::sync::Arc;

use super::authn::AuthnGate;
use super::render::Templates;
use super::resource::Resource;
use super::router::{HostRouter, PathMatch, PathRouter};
use super::target::Target;

pub enum Route {
    Target(Arc<Target>),
    /// The aggregate listing of every target.
    TargetList(Arc<TargetList>),
}

pub struct TargetList {
    pub resources: Vec<Resource>,
}

/// Everything a request needs to be served, built in one go from the
/// configuration. Requests keep the table they started with, a reload
/// publishes a new one.
pub struct RouterTable {
    pub hosts: HostRouter<PathRouter<Route>>,
    pub authn: AuthnGate,
    pub templates: Arc<Templates>,
    pub targets: Vec<Arc<Target>>,
}

impl RouterTable {
    pub fn route<'a>(&'a self, host: &str, path: &'a str) -> Option<PathMatch<'a, Route>> {
        self.hosts.resolve(host)?.find(path)
    }

    pub fn target(&self, name: &str) -> Option<&Arc<Target>> {
        self.targets.iter().find(|target| target.name == name)
    }
}
