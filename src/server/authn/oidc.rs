use std::collections::HashMap;

use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use anyhow::{bail, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use log::{debug, warn};
use serde_json::Value;

use crate::server::resource::ResourceAuth;

use super::{Authenticator, AuthnResponse, Identity, OidcUser};

/// Validates ID tokens issued by an OpenID Connect provider. The token is
/// read from the `Authorization: Bearer` header, or from a cookie set by the
/// login flow.
pub struct OidcAuthenticator {
    key: DecodingKey,
    validation: Validation,

    cookie_name: String,
    email_claim: String,
    groups_claim: String,
    login_url: Option<String>,
}

type Claims = HashMap<String, Value>;

impl OidcAuthenticator {
    pub fn new(
        key: DecodingKey,
        validation: Validation,
        cookie_name: impl Into<String>,
        email_claim: impl Into<String>,
        groups_claim: impl Into<String>,
        login_url: Option<String>,
    ) -> Self {
        Self {
            key,
            validation,
            cookie_name: cookie_name.into(),
            email_claim: email_claim.into(),
            groups_claim: groups_claim.into(),
            login_url,
        }
    }

    fn reject(&self) -> AuthnResponse {
        match self.login_url.as_ref() {
            Some(url) => AuthnResponse::Redirect(url.clone()),
            None => AuthnResponse::Unauthenticated(Some(String::from("Bearer"))),
        }
    }

    fn extract_token(&self, req: &HttpRequest) -> Option<String> {
        if let Some(value) = req.headers().get(AUTHORIZATION) {
            if let Ok(value) = value.to_str() {
                if let Some((scheme, token)) = value.trim().split_once(' ') {
                    let token = token.trim();
                    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
        let cookie = req.cookie(&self.cookie_name)?;
        let token = cookie.value().trim();
        if token.is_empty() {
            return None;
        }
        Some(token.to_string())
    }

    fn parse_groups(value: Option<&Value>) -> Vec<String> {
        match value {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
            Some(Value::String(group)) => vec![group.clone()],
            _ => Vec::new(),
        }
    }
}

impl Authenticator for OidcAuthenticator {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        auth: &ResourceAuth,
    ) -> Result<AuthnResponse> {
        let ResourceAuth::Oidc { .. } = auth else {
            bail!("oidc authenticator cannot serve a non oidc resource");
        };

        let Some(token) = self.extract_token(req) else {
            return Ok(self.reject());
        };

        let claims = match decode::<Claims>(&token, &self.key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("Reject oidc token: {e}");
                return Ok(self.reject());
            }
        };

        let email = match claims.get(&self.email_claim).and_then(Value::as_str) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => {
                warn!("Oidc token has no '{}' claim", self.email_claim);
                return Ok(self.reject());
            }
        };
        let groups = Self::parse_groups(claims.get(&self.groups_claim));

        Ok(AuthnResponse::Ok(Identity::Oidc(OidcUser { email, groups })))
    }
}
