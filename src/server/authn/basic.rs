use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use anyhow::{bail, Result};
use base64::prelude::*;
use sha2::{Digest, Sha256};

use crate::server::resource::ResourceAuth;

use super::{Authenticator, AuthnResponse, BasicUser, Identity};

/// A user allowed on a basic resource. Only the password digest is kept in
/// memory.
#[derive(Clone)]
pub struct BasicCredential {
    pub user: String,
    digest: Vec<u8>,
}

impl BasicCredential {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            digest: Self::digest(password),
        }
    }

    fn digest(password: &str) -> Vec<u8> {
        Sha256::digest(password.as_bytes()).to_vec()
    }

    pub fn verify(&self, user: &str, password: &str) -> bool {
        self.user == user && self.digest == Self::digest(password)
    }
}

impl std::fmt::Debug for BasicCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredential")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

pub struct BasicAuthenticator {
    realm: String,
}

impl BasicAuthenticator {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
        }
    }

    fn challenge(&self) -> AuthnResponse {
        AuthnResponse::Unauthenticated(Some(format!("Basic realm=\"{}\"", self.realm)))
    }

    /// Extract `user:password` from an `Authorization: Basic ...` header.
    fn parse_header(req: &HttpRequest) -> Option<(String, String)> {
        let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?.trim();
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }
}

impl Authenticator for BasicAuthenticator {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        auth: &ResourceAuth,
    ) -> Result<AuthnResponse> {
        let ResourceAuth::Basic { credentials, .. } = auth else {
            bail!("basic authenticator cannot serve a non basic resource");
        };

        let Some((user, password)) = Self::parse_header(req) else {
            return Ok(self.challenge());
        };

        if !credentials.iter().any(|cred| cred.verify(&user, &password)) {
            return Ok(self.challenge());
        }

        Ok(AuthnResponse::Ok(Identity::Basic(BasicUser { username: user })))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    fn header(user: &str, password: &str) -> (String, String) {
        let encoded = BASE64_STANDARD.encode(format!("{user}:{password}"));
        (String::from("Authorization"), format!("Basic {encoded}"))
    }

    #[test]
    fn test_basic_authenticator() {
        let authenticator = BasicAuthenticator::new("files");
        let auth = ResourceAuth::Basic {
            provider: String::from("local"),
            credentials: vec![
                BasicCredential::new("alice", "secret"),
                BasicCredential::new("bob", "p:ss"),
            ],
        };
        let challenge =
            AuthnResponse::Unauthenticated(Some(String::from("Basic realm=\"files\"")));

        let req = TestRequest::default()
            .insert_header(header("alice", "secret"))
            .to_http_request();
        let resp = authenticator.authenticate_request(&req, &auth).unwrap();
        assert_eq!(
            resp,
            AuthnResponse::Ok(Identity::Basic(BasicUser {
                username: String::from("alice")
            }))
        );

        let req = TestRequest::default()
            .insert_header(header("bob", "p:ss"))
            .to_http_request();
        let resp = authenticator.authenticate_request(&req, &auth).unwrap();
        assert!(matches!(resp, AuthnResponse::Ok(_)));

        let req = TestRequest::default()
            .insert_header(header("alice", "wrong"))
            .to_http_request();
        let resp = authenticator.authenticate_request(&req, &auth).unwrap();
        assert_eq!(resp, challenge);

        let req = TestRequest::default().to_http_request();
        let resp = authenticator.authenticate_request(&req, &auth).unwrap();
        assert_eq!(resp, challenge);

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic !!!"))
            .to_http_request();
        let resp = authenticator.authenticate_request(&req, &auth).unwrap();
        assert_eq!(resp, challenge);

        let oidc = ResourceAuth::Oidc {
            provider: String::from("sso"),
            accesses: vec![],
        };
        assert!(authenticator.authenticate_request(&req, &oidc).is_err());
    }
}
