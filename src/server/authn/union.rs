use actix_web::HttpRequest;
use anyhow::Result;

use crate::server::resource::ResourceAuth;

use super::basic::BasicAuthenticator;
use super::oidc::OidcAuthenticator;
use super::{Authenticator, AuthnResponse};

pub enum UnionAuthenticator {
    Basic(BasicAuthenticator),
    Oidc(OidcAuthenticator),
}

impl UnionAuthenticator {
    pub fn kind(&self) -> &'static str {
        match self {
            UnionAuthenticator::Basic(_) => "basic",
            UnionAuthenticator::Oidc(_) => "oidc",
        }
    }
}

impl Authenticator for UnionAuthenticator {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        auth: &ResourceAuth,
    ) -> Result<AuthnResponse> {
        match self {
            UnionAuthenticator::Basic(auth_impl) => auth_impl.authenticate_request(req, auth),
            UnionAuthenticator::Oidc(auth_impl) => auth_impl.authenticate_request(req, auth),
        }
    }
}
