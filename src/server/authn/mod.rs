mod basic;
mod gate;
mod oidc;
mod union;

pub mod config;
pub mod factory;

pub use basic::BasicCredential;
pub use gate::AuthnGate;

use actix_web::HttpRequest;
use anyhow::Result;

use super::resource::ResourceAuth;

/// The authenticated principal of a request. Which variant is produced
/// depends on the authentication mode of the matched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Basic(BasicUser),
    Oidc(OidcUser),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicUser {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcUser {
    pub email: String,
    pub groups: Vec<String>,
}

pub trait Authenticator: Send + Sync {
    fn authenticate_request(&self, req: &HttpRequest, auth: &ResourceAuth)
        -> Result<AuthnResponse>;
}

/// Possible responses from an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthnResponse {
    /// The request carries valid credentials
    Ok(Identity),
    /// Missing or invalid credentials, with the `WWW-Authenticate` challenge
    /// to send back
    Unauthenticated(Option<String>),
    /// Send the client to a login page
    Redirect(String),
}
