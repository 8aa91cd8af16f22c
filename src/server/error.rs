use thiserror::Error;

use super::render::TemplateKind;
use super::storage::StorageError;

/// Failures that end a request with a rendered error page.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("not found")]
    NotFound,

    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    /// A resource asked for an authentication mode or provider the gate
    /// cannot serve. Valid configurations never produce it.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProxyError {
    pub fn template_kind(&self) -> TemplateKind {
        match self {
            Self::NotFound => TemplateKind::NotFound,
            Self::Unauthorized => TemplateKind::Unauthorized,
            Self::Forbidden => TemplateKind::Forbidden,
            Self::UnsupportedConfiguration(_) | Self::Internal(_) => {
                TemplateKind::InternalServerError
            }
        }
    }

    /// Message exposed on the internal server error page.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::UnsupportedConfiguration(_) | Self::Internal(_) => Some(format!("{self:#}")),
            _ => None,
        }
    }
}

impl From<StorageError> for ProxyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            StorageError::RangeNotSatisfiable(size) => Self::Internal(anyhow::anyhow!(
                "range not satisfiable for object of {size} bytes"
            )),
            StorageError::Other(err) => Self::Internal(err),
        }
    }
}
