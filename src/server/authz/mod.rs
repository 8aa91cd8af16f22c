mod access;

pub use access::{is_authorized, AccessRule};

use anyhow::{bail, Result};
use log::{error, info};

use super::authn::Identity;
use super::resource::{Resource, ResourceAuth};

#[derive(Debug, Clone, Copy)]
pub struct AuthzRequest<'a> {
    pub resource: Option<&'a Resource>,
    pub identity: Option<&'a Identity>,
}

/// Possible responses from an authorization check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthzResponse {
    /// Access is granted
    Ok,
    /// The identity does not match any authorization access
    Forbidden,
}

/// Decide whether the identity produced by the authentication stage may
/// access the matched resource.
///
/// Requests without a resource, or on a whitelisted one, are always allowed.
/// An error means the resource and the identity do not fit together, which
/// only happens on a bug or an unsupported configuration.
pub fn authorize_request(req: &AuthzRequest) -> Result<AuthzResponse> {
    let Some(resource) = req.resource else {
        return Ok(AuthzResponse::Ok);
    };
    if resource.whitelist {
        return Ok(AuthzResponse::Ok);
    }

    match (resource.auth.as_ref(), req.identity) {
        (Some(ResourceAuth::Basic { .. }), Some(Identity::Basic(user))) => {
            info!("Basic auth user '{}' authorized", user.username);
            Ok(AuthzResponse::Ok)
        }
        (Some(ResourceAuth::Oidc { accesses, .. }), Some(Identity::Oidc(user))) => {
            if is_authorized(accesses, &user.email, &user.groups) {
                info!("OIDC user '{}' authorized", user.email);
                return Ok(AuthzResponse::Ok);
            }
            error!(
                "Forbidden user '{}' on resource '{}'",
                user.email,
                resource.pattern.as_str()
            );
            Ok(AuthzResponse::Forbidden)
        }
        _ => bail!(
            "authorization not supported for resource '{}'",
            resource.pattern.as_str()
        ),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::Method;

    use crate::server::authn::{BasicCredential, BasicUser, OidcUser};
    use crate::server::resource::PathPattern;
    use crate::server::resource::config::AccessConfig;

    use super::*;

    fn resource(auth: Option<ResourceAuth>) -> Resource {
        Resource {
            pattern: PathPattern::new("/files/*").unwrap(),
            methods: vec![Method::GET],
            whitelist: auth.is_none(),
            auth,
        }
    }

    fn oidc_resource(group: &str) -> Resource {
        let access = AccessRule::from_config(&AccessConfig {
            group: Some(group.to_string()),
            email: None,
            regexp: false,
        })
        .unwrap();
        resource(Some(ResourceAuth::Oidc {
            provider: String::from("sso"),
            accesses: vec![access],
        }))
    }

    fn oidc_user(groups: &[&str]) -> Identity {
        Identity::Oidc(OidcUser {
            email: String::from("bob@example.com"),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        })
    }

    #[test]
    fn test_authorize_request() {
        let req = AuthzRequest {
            resource: None,
            identity: None,
        };
        assert_eq!(authorize_request(&req).unwrap(), AuthzResponse::Ok);

        let public = resource(None);
        let req = AuthzRequest {
            resource: Some(&public),
            identity: None,
        };
        assert_eq!(authorize_request(&req).unwrap(), AuthzResponse::Ok);

        let admins = oidc_resource("admins");
        let user = oidc_user(&["users"]);
        let req = AuthzRequest {
            resource: Some(&admins),
            identity: Some(&user),
        };
        assert_eq!(authorize_request(&req).unwrap(), AuthzResponse::Forbidden);

        let admin = oidc_user(&["users", "admins"]);
        let req = AuthzRequest {
            resource: Some(&admins),
            identity: Some(&admin),
        };
        assert_eq!(authorize_request(&req).unwrap(), AuthzResponse::Ok);

        let basic = resource(Some(ResourceAuth::Basic {
            provider: String::from("local"),
            credentials: vec![BasicCredential::new("alice", "secret")],
        }));
        let alice = Identity::Basic(BasicUser {
            username: String::from("alice"),
        });
        let req = AuthzRequest {
            resource: Some(&basic),
            identity: Some(&alice),
        };
        assert_eq!(authorize_request(&req).unwrap(), AuthzResponse::Ok);
    }

    #[test]
    fn test_authorize_mismatch() {
        let admins = oidc_resource("admins");
        let alice = Identity::Basic(BasicUser {
            username: String::from("alice"),
        });
        let req = AuthzRequest {
            resource: Some(&admins),
            identity: Some(&alice),
        };
        assert!(authorize_request(&req).is_err());

        let req = AuthzRequest {
            resource: Some(&admins),
            identity: None,
        };
        assert!(authorize_request(&req).is_err());
    }
}
