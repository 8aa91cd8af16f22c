pub mod config;

use std::sync::Arc;

use actix_web::http::Method;
use anyhow::{Context, Result};

use super::render::{Templates, TargetView};
use super::resource::Resource;
use super::storage::config::StorageProvider;
use super::storage::Storage;

use config::{ActionsConfig, TargetConfig};

/// A configured bucket, ready to serve requests. Built from configuration and
/// never modified afterwards; a reload builds new targets.
pub struct Target {
    pub name: String,
    pub bucket_name: String,
    /// Key prefix inside the bucket, empty or ending with `/`.
    pub prefix: String,
    pub host: String,
    pub paths: Vec<String>,
    pub actions: ActionsConfig,
    pub resources: Vec<Resource>,
    pub storage: Arc<dyn Storage>,
    pub templates: Templates,
}

impl Target {
    pub fn new(cfg: &TargetConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let resources = cfg
            .resources
            .iter()
            .map(Resource::from_config)
            .collect::<Result<Vec<_>>>()?;
        let templates = Templates::overrides(&cfg.templates)
            .with_context(|| format!("load templates for target '{}'", cfg.name))?;
        let bucket_name = match cfg.bucket.provider {
            StorageProvider::S3 => cfg.bucket.name.clone(),
            StorageProvider::Local => cfg.bucket.root.clone(),
            StorageProvider::Memory if cfg.bucket.name.is_empty() => String::from("memory"),
            StorageProvider::Memory => cfg.bucket.name.clone(),
        };

        Ok(Self {
            name: cfg.name.clone(),
            bucket_name,
            prefix: cfg.bucket.prefix.clone(),
            host: cfg.mount.host.clone(),
            paths: cfg.mount.paths.clone(),
            actions: cfg.actions,
            resources,
            storage,
            templates,
        })
    }

    pub fn allows(&self, method: &Method) -> bool {
        match *method {
            Method::GET => self.actions.get,
            Method::PUT => self.actions.put,
            Method::DELETE => self.actions.delete,
            _ => false,
        }
    }

    /// Value of the `Allow` header.
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut methods = Vec::with_capacity(3);
        if self.actions.get {
            methods.push(Method::GET);
        }
        if self.actions.put {
            methods.push(Method::PUT);
        }
        if self.actions.delete {
            methods.push(Method::DELETE);
        }
        methods
    }

    pub fn view(&self) -> TargetView {
        TargetView {
            name: self.name.clone(),
            bucket: self.bucket_name.clone(),
            host: self.host.clone(),
            paths: self.paths.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{CommonConfig, PathSet};
    use crate::server::storage::object::ObjectStoreClient;

    use super::*;

    #[test]
    fn test_target() {
        let mut cfg: TargetConfig = toml::from_str(
            r#"
            name = "site"

            [bucket]
            provider = "memory"
            prefix = "/www"

            [mount]
            host = "site.example.com"
            paths = ["/site/"]

            [actions]
            delete = true

            [[resources]]
            path = "/site/*"
            whitelist = true
            "#,
        )
        .unwrap();
        cfg.complete(&PathSet::new("config.toml")).unwrap();

        let target = Target::new(&cfg, Arc::new(ObjectStoreClient::memory())).unwrap();
        assert_eq!(target.bucket_name, "memory");
        assert_eq!(target.prefix, "www/");
        assert_eq!(target.paths, vec!["/site"]);
        assert_eq!(target.resources.len(), 1);

        assert!(target.allows(&Method::GET));
        assert!(!target.allows(&Method::HEAD));
        assert!(target.allows(&Method::DELETE));
        assert!(!target.allows(&Method::PUT));
        assert!(!target.allows(&Method::POST));
        assert_eq!(target.allowed_methods(), vec![Method::GET, Method::DELETE]);

        let view = target.view();
        assert_eq!(view.name, "site");
        assert_eq!(view.host, "site.example.com");
    }
}
