use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

/// Template files, each entry replaces the page of the same kind. Unset
/// entries fall back to the next scope (target, then global, then the
/// built-in pages).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TemplatesConfig {
    #[serde(default)]
    pub folder_list: Option<String>,

    #[serde(default)]
    pub target_list: Option<String>,

    #[serde(default)]
    pub not_found: Option<String>,

    #[serde(default)]
    pub unauthorized: Option<String>,

    #[serde(default)]
    pub forbidden: Option<String>,

    #[serde(default)]
    pub internal_server_error: Option<String>,
}

impl CommonConfig for TemplatesConfig {
    fn default() -> Self {
        Self {
            folder_list: None,
            target_list: None,
            not_found: None,
            unauthorized: None,
            forbidden: None,
            internal_server_error: None,
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        for (name, path) in [
            ("folder_list", &mut self.folder_list),
            ("target_list", &mut self.target_list),
            ("not_found", &mut self.not_found),
            ("unauthorized", &mut self.unauthorized),
            ("forbidden", &mut self.forbidden),
            ("internal_server_error", &mut self.internal_server_error),
        ] {
            let Some(value) = path.take() else {
                continue;
            };
            let value = expandenv(name, value)?;
            if value.is_empty() {
                continue;
            }
            *path = Some(format!("{}", ps.resolve(value).display()));
        }
        Ok(())
    }
}
