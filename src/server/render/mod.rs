pub mod config;

use std::collections::{HashMap, HashSet};
use std::fs;

use actix_web::http::StatusCode;
use anyhow::{Context, Result};
use log::error;
use minijinja::{AutoEscape, Environment};
use serde::Serialize;

use config::TemplatesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    FolderList,
    TargetList,
    NotFound,
    Unauthorized,
    Forbidden,
    InternalServerError,
}

impl TemplateKind {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::FolderList | Self::TargetList => StatusCode::OK,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FolderList => "folder-list",
            Self::TargetList => "target-list",
            Self::NotFound => "not-found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::InternalServerError => "internal-server-error",
        }
    }

    /// Last resort body, written when no template could be rendered.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            Self::NotFound => "404 page not found",
            Self::Unauthorized => "401 unauthorized",
            Self::Forbidden => "403 forbidden",
            Self::FolderList | Self::TargetList | Self::InternalServerError => {
                "500 internal server error"
            }
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Self::FolderList => include_str!("../../../templates/folder-list.html"),
            Self::TargetList => include_str!("../../../templates/target-list.html"),
            Self::NotFound => include_str!("../../../templates/not-found.html"),
            Self::Unauthorized => include_str!("../../../templates/unauthorized.html"),
            Self::Forbidden => include_str!("../../../templates/forbidden.html"),
            Self::InternalServerError => {
                include_str!("../../../templates/internal-server-error.html")
            }
        }
    }

    const ALL: [TemplateKind; 6] = [
        Self::FolderList,
        Self::TargetList,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::InternalServerError,
    ];
}

/// Data exposed to every template. Fields that do not apply to a page are
/// left empty.
#[derive(Debug, Default, Serialize)]
pub struct PageData {
    /// Request path.
    pub path: String,
    /// Target name.
    pub name: Option<String>,
    pub bucket_name: Option<String>,
    /// Error message, internal server error page only.
    pub error: Option<String>,
    pub entries: Vec<EntryView>,
    pub targets: Vec<TargetView>,
}

impl PageData {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub name: String,
    pub key: String,
    /// Absolute request path of the entry, usable as a link.
    pub path: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub human_size: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TargetView {
    pub name: String,
    pub bucket: String,
    pub host: String,
    pub paths: Vec<String>,
}

/// The compiled templates of one scope, either the process-wide set or the
/// overrides of a single target.
pub struct Templates {
    env: Environment<'static>,
    kinds: HashSet<TemplateKind>,
}

impl Templates {
    /// Compile every source once. A syntax error fails the whole scope.
    fn new(sources: HashMap<TemplateKind, String>) -> Result<Self> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        let mut kinds = HashSet::with_capacity(sources.len());
        for (kind, source) in sources {
            env.add_template_owned(kind.name(), source)
                .with_context(|| format!("compile {} template", kind.name()))?;
            kinds.insert(kind);
        }
        Ok(Self { env, kinds })
    }

    /// Built-in pages overridden by the configured files.
    pub fn global(cfg: &TemplatesConfig) -> Result<Self> {
        let mut sources: HashMap<_, _> = TemplateKind::ALL
            .iter()
            .map(|kind| (*kind, kind.builtin().to_string()))
            .collect();
        sources.extend(Self::read_files(cfg)?);
        Self::new(sources)
    }

    /// Only the configured files, kinds left unset are resolved by the next
    /// scope.
    pub fn overrides(cfg: &TemplatesConfig) -> Result<Self> {
        Self::new(Self::read_files(cfg)?)
    }

    #[cfg(test)]
    pub fn from_sources(sources: Vec<(TemplateKind, &str)>) -> Self {
        Self::new(
            sources
                .into_iter()
                .map(|(kind, source)| (kind, source.to_string()))
                .collect(),
        )
        .unwrap()
    }

    fn read_files(cfg: &TemplatesConfig) -> Result<HashMap<TemplateKind, String>> {
        let mut sources = HashMap::new();
        for (kind, path) in [
            (TemplateKind::FolderList, &cfg.folder_list),
            (TemplateKind::TargetList, &cfg.target_list),
            (TemplateKind::NotFound, &cfg.not_found),
            (TemplateKind::Unauthorized, &cfg.unauthorized),
            (TemplateKind::Forbidden, &cfg.forbidden),
            (TemplateKind::InternalServerError, &cfg.internal_server_error),
        ] {
            let Some(path) = path else {
                continue;
            };
            let source = fs::read_to_string(path)
                .with_context(|| format!("read {} template file: {path}", kind.name()))?;
            sources.insert(kind, source);
        }
        Ok(sources)
    }

    pub fn has(&self, kind: TemplateKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Render `kind`, `None` when this scope has no template for it.
    pub fn render(&self, kind: TemplateKind, data: &PageData) -> Result<Option<String>> {
        if !self.has(kind) {
            return Ok(None);
        }
        let body = self
            .env
            .get_template(kind.name())
            .and_then(|template| template.render(data))
            .with_context(|| format!("render {} template", kind.name()))?;
        Ok(Some(body))
    }
}

/// A rendered page, ready to be written as a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub status: StatusCode,
    pub body: String,
    pub html: bool,
}

/// Ordered template scopes tried one after the other. Error pages end with a
/// fixed text that cannot fail.
pub struct Cascade<'a> {
    scopes: Vec<&'a Templates>,
}

impl<'a> Cascade<'a> {
    pub fn new(scopes: Vec<&'a Templates>) -> Self {
        Self { scopes }
    }

    /// Render a success page (listings). The first scope defining `kind`
    /// renders it, an error is returned when that render fails.
    pub fn render_page(&self, kind: TemplateKind, data: &PageData) -> Result<Page> {
        for scope in self.scopes.iter() {
            if let Some(body) = scope.render(kind, data)? {
                return Ok(Page {
                    status: kind.status(),
                    body,
                    html: true,
                });
            }
        }
        anyhow::bail!("no {} template available", kind.name())
    }

    /// Render an error page. A scope that fails to render is skipped, the
    /// fixed text is used when every scope failed.
    pub fn render_error(&self, kind: TemplateKind, data: &PageData) -> Page {
        for scope in self.scopes.iter() {
            match scope.render(kind, data) {
                Ok(Some(body)) => {
                    return Page {
                        status: kind.status(),
                        body,
                        html: true,
                    }
                }
                Ok(None) => continue,
                Err(e) => error!("Render error page failed: {e:#}"),
            }
        }
        Page {
            status: kind.status(),
            body: String::from(kind.fallback_text()),
            html: false,
        }
    }
}
