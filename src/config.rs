use std::path::{Path, PathBuf};
use std::{fs, io};

use anyhow::{Context, Result};
use log::warn;
use serde::de::DeserializeOwned;

/// Locations derived from the configuration file, used to resolve relative
/// paths found inside the configuration (template files, key files, local
/// bucket directories).
#[derive(Debug, Clone)]
pub struct PathSet {
    pub config_file: PathBuf,
    pub config_dir: PathBuf,
}

impl PathSet {
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        let config_file = config_file.into();
        let config_dir = match config_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            config_file,
            config_dir,
        }
    }

    /// Resolve `path` against the configuration directory. Absolute paths are
    /// returned unchanged.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            return path.to_path_buf();
        }
        self.config_dir.join(path)
    }

    pub fn load_config<T>(&self) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
    {
        let mut cfg: T = match fs::read_to_string(&self.config_file) {
            Ok(s) => toml::from_str(&s).context("parse config toml")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Config file '{}' not found, using defaults",
                    self.config_file.display()
                );
                T::default()
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("read config file: {}", self.config_file.display())
                });
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }
}

pub trait CommonConfig {
    fn default() -> Self;
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let ps = PathSet::new("/etc/bucketsite/config.toml");
        assert_eq!(ps.config_dir, PathBuf::from("/etc/bucketsite"));
        assert_eq!(
            ps.resolve("templates/404.html"),
            PathBuf::from("/etc/bucketsite/templates/404.html")
        );
        assert_eq!(ps.resolve("/tmp/a.html"), PathBuf::from("/tmp/a.html"));

        let ps = PathSet::new("config.toml");
        assert_eq!(ps.config_dir, PathBuf::from("."));
    }

    #[test]
    fn test_expandenv() {
        std::env::set_var("BUCKETSITE_TEST_SECRET", "s3cr3t");
        let value = expandenv("password", "${BUCKETSITE_TEST_SECRET}").unwrap();
        assert_eq!(value, "s3cr3t");

        let value = expandenv("password", "plain").unwrap();
        assert_eq!(value, "plain");

        assert!(expandenv("password", "${BUCKETSITE_TEST_MISSING_VAR}").is_err());
    }
}
