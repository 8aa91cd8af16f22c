use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use log::info;

use super::basic::BasicAuthenticator;
use super::config::{AuthProvidersConfig, OidcProviderConfig};
use super::gate::AuthnGate;
use super::oidc::OidcAuthenticator;
use super::union::UnionAuthenticator;

/// Builds the authentication gate from the configured providers.
pub struct AuthnFactory;

impl AuthnFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_gate(&self, cfg: &AuthProvidersConfig) -> Result<AuthnGate> {
        let mut providers = HashMap::with_capacity(cfg.basic.len() + cfg.oidc.len());

        for (name, basic) in cfg.basic.iter() {
            let authenticator = BasicAuthenticator::new(basic.realm.clone());
            providers.insert(name.clone(), UnionAuthenticator::Basic(authenticator));
            info!("Basic auth provider '{name}' loaded");
        }

        for (name, oidc) in cfg.oidc.iter() {
            let authenticator = self
                .build_oidc(oidc)
                .with_context(|| format!("build oidc provider '{name}'"))?;
            providers.insert(name.clone(), UnionAuthenticator::Oidc(authenticator));
            info!("OIDC auth provider '{name}' loaded, issuer '{}'", oidc.issuer_url);
        }

        Ok(AuthnGate::new(providers))
    }

    fn build_oidc(&self, cfg: &OidcProviderConfig) -> Result<OidcAuthenticator> {
        let algorithm = cfg.parse_algorithm()?;
        let key = Self::build_key(cfg, algorithm)?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[cfg.issuer_url.as_str()]);
        match cfg.client_id.as_ref() {
            Some(client_id) => validation.set_audience(&[client_id.as_str()]),
            None => validation.validate_aud = false,
        }

        Ok(OidcAuthenticator::new(
            key,
            validation,
            cfg.cookie_name.clone(),
            cfg.email_claim.clone(),
            cfg.groups_claim.clone(),
            cfg.login_url.clone(),
        ))
    }

    fn build_key(cfg: &OidcProviderConfig, algorithm: Algorithm) -> Result<DecodingKey> {
        if let Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 = algorithm {
            let secret = cfg.secret.as_deref().unwrap_or_default();
            return Ok(DecodingKey::from_secret(secret.as_bytes()));
        }

        let path = cfg.public_key_path.as_deref().unwrap_or_default();
        let pem = fs::read(path).with_context(|| format!("read public key file: {path}"))?;
        let key = match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(&pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(&pem),
            _ => DecodingKey::from_rsa_pem(&pem),
        };
        key.with_context(|| format!("parse public key file: {path}"))
    }
}
