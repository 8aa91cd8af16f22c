use std::collections::HashMap;

use actix_web::HttpRequest;

use crate::server::error::ProxyError;
use crate::server::resource::{Resource, ResourceAuth};

use super::union::UnionAuthenticator;
use super::{Authenticator, AuthnResponse};

/// Runs the authenticator the matched resource asks for. Providers are keyed
/// by their configured name.
pub struct AuthnGate {
    providers: HashMap<String, UnionAuthenticator>,
}

impl AuthnGate {
    pub fn new(providers: HashMap<String, UnionAuthenticator>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Authenticate `req` against `resource`. `None` is returned when there
    /// is nothing to check: no resource matched, or it is whitelisted.
    pub fn authenticate(
        &self,
        req: &HttpRequest,
        resource: Option<&Resource>,
    ) -> Result<Option<AuthnResponse>, ProxyError> {
        let Some(resource) = resource else {
            return Ok(None);
        };
        if resource.whitelist {
            return Ok(None);
        }
        let Some(auth) = resource.auth.as_ref() else {
            return Err(ProxyError::UnsupportedConfiguration(format!(
                "resource '{}' has no authentication",
                resource.pattern.as_str()
            )));
        };

        let name = auth.provider();
        let Some(authenticator) = self.providers.get(name) else {
            return Err(ProxyError::UnsupportedConfiguration(format!(
                "auth provider '{name}' not found"
            )));
        };
        let expect = match auth {
            ResourceAuth::Basic { .. } => "basic",
            ResourceAuth::Oidc { .. } => "oidc",
        };
        if authenticator.kind() != expect {
            return Err(ProxyError::UnsupportedConfiguration(format!(
                "auth provider '{name}' is {}, resource '{}' requires {expect}",
                authenticator.kind(),
                resource.pattern.as_str()
            )));
        }

        let resp = authenticator.authenticate_request(req, auth)?;
        Ok(Some(resp))
    }
}
