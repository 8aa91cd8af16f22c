use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageProvider {
    #[serde(rename = "s3")]
    #[default]
    S3,

    /// A directory on the local filesystem.
    #[serde(rename = "local")]
    Local,

    /// Volatile in-process bucket, mostly useful for demos and tests.
    #[serde(rename = "memory")]
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BucketConfig {
    #[serde(default = "StorageProvider::default")]
    pub provider: StorageProvider,

    /// Bucket name, required by the `s3` provider.
    #[serde(default = "BucketConfig::default_string")]
    pub name: String,

    #[serde(default = "BucketConfig::default_region")]
    pub region: String,

    /// Custom S3 endpoint (MinIO, Ceph...). Plain http is allowed when set.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Key prefix inside the bucket, every request path is appended to it.
    #[serde(default = "BucketConfig::default_string")]
    pub prefix: String,

    /// Root directory, required by the `local` provider. Relative paths are
    /// resolved against the config directory.
    #[serde(default = "BucketConfig::default_string")]
    pub root: String,

    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CredentialsConfig {
    pub access_key: String,
    pub secret_key: String,
}

impl CommonConfig for BucketConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            name: Self::default_string(),
            region: Self::default_region(),
            endpoint: None,
            prefix: Self::default_string(),
            root: Self::default_string(),
            credentials: None,
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        match self.provider {
            StorageProvider::S3 => {
                if self.name.is_empty() {
                    bail!("bucket name is required for s3 provider");
                }
                if self.region.is_empty() {
                    bail!("bucket region cannot be empty");
                }
            }
            StorageProvider::Local => {
                self.root = expandenv("root", &self.root)?;
                if self.root.is_empty() {
                    bail!("bucket root is required for local provider");
                }
                self.root = format!("{}", ps.resolve(&self.root).display());
            }
            StorageProvider::Memory => {}
        }

        if let Some(creds) = self.credentials.as_mut() {
            creds.access_key = expandenv("access_key", &creds.access_key)?;
            creds.secret_key = expandenv("secret_key", &creds.secret_key)?;
            if creds.access_key.is_empty() || creds.secret_key.is_empty() {
                bail!("both access_key and secret_key should be set");
            }
        }

        self.prefix = Self::normalize_prefix(&self.prefix);
        Ok(())
    }
}

impl BucketConfig {
    pub fn default_string() -> String {
        String::new()
    }

    pub fn default_region() -> String {
        String::from("us-east-1")
    }

    /// `/a/b` and `a/b/` both become `a/b/`, empty stays empty.
    fn normalize_prefix(prefix: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return String::new();
        }
        format!("{prefix}/")
    }
}
