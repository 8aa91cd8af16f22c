use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};

use super::authn::factory::AuthnFactory;
use super::config::{Config, ServerConfig};
use super::render::Templates;
use super::resource::Resource;
use super::restful::{RestfulServer, ServerState};
use super::router::{HostRouter, PathRouter};
use super::storage::object::ObjectStoreClient;
use super::table::{Route, RouterTable, TargetList};
use super::target::Target;

pub struct ServerFactory<'a> {
    cfg: &'a Config,
}

impl<'a> ServerFactory<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self { cfg }
    }

    /// Build every target, provider and template of the configuration. Any
    /// failure leaves nothing half built.
    pub fn build_table(&self) -> Result<RouterTable> {
        let templates = Templates::global(&self.cfg.templates).context("load global templates")?;

        let authn = AuthnFactory::new()
            .build_gate(&self.cfg.auth_providers)
            .context("init auth providers")?;

        let mut hosts: HostRouter<PathRouter<Route>> = HostRouter::new();

        let list_targets = &self.cfg.list_targets;
        if list_targets.enabled {
            let resources = match list_targets.resource.as_ref() {
                Some(res) => vec![Resource::from_config(res).context("list targets resource")?],
                None => Vec::new(),
            };
            let list = Arc::new(TargetList { resources });
            let paths = hosts.get_or_insert_with(&list_targets.mount.host, PathRouter::new);
            for path in list_targets.mount.paths.iter() {
                paths
                    .insert(path, Route::TargetList(list.clone()))
                    .context("mount target list")?;
            }
            info!(
                "Target list mounted on host '{}', paths {:?}",
                list_targets.mount.host, list_targets.mount.paths
            );
        }

        let mut targets = Vec::with_capacity(self.cfg.targets.len());
        for cfg in self.cfg.targets.iter() {
            let storage = ObjectStoreClient::from_config(&cfg.bucket)
                .with_context(|| format!("init storage for target '{}'", cfg.name))?;
            let target = Arc::new(
                Target::new(cfg, Arc::new(storage))
                    .with_context(|| format!("init target '{}'", cfg.name))?,
            );

            let paths = hosts.get_or_insert_with(&target.host, PathRouter::new);
            for path in target.paths.iter() {
                paths
                    .insert(path, Route::Target(target.clone()))
                    .with_context(|| format!("mount target '{}'", target.name))?;
            }
            info!(
                "Target '{}' mounted on host '{}', paths {:?}",
                target.name, target.host, target.paths
            );
            targets.push(target);
        }

        Ok(RouterTable {
            hosts,
            authn,
            templates: Arc::new(templates),
            targets,
        })
    }

    pub fn build_server(&self, state: Arc<ServerState>) -> Result<RestfulServer> {
        let srv_cfg = &self.cfg.server;
        let ssl = Self::build_ssl(srv_cfg)?;

        let mut srv = RestfulServer::new(srv_cfg.bind.clone(), ssl, state);
        if srv_cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(srv_cfg.keep_alive_secs);
        }
        if srv_cfg.workers > 0 {
            srv.set_workers(srv_cfg.workers);
        }

        Ok(srv)
    }

    fn build_ssl(cfg: &ServerConfig) -> Result<Option<SslAcceptorBuilder>> {
        if !cfg.ssl {
            return Ok(None);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&cfg.key_path, SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&cfg.cert_path)
            .context("load ssl cert file")?;

        Ok(Some(builder))
    }
}
