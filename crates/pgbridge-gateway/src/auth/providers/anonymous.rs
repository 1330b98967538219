//! Anonymous provider
//!
//! Accepts every credential and runs the session as the anonymous identity.

use async_trait::async_trait;
use pgbridge_common::{Credential, Identity};

use super::IdentityProvider;
use crate::auth::config::AuthMethodKind;
use crate::auth::identity::AuthResult;

#[derive(Debug, Default)]
pub struct AnonymousProvider;

impl AnonymousProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityProvider for AnonymousProvider {
    fn name(&self) -> &str {
        "anonymous"
    }

    fn supports(&self, _method: AuthMethodKind) -> bool {
        true
    }

    async fn identify(&self, credential: Credential) -> AuthResult {
        tracing::debug!(user = %credential.user(), "Anonymous identity: accepting credential");
        AuthResult::Success(Identity::anonymous(credential, self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_credential_is_anonymous() {
        let provider = AnonymousProvider::new();
        for credential in [
            Credential::Anonymous { user: "a".into() },
            Credential::Password { user: "b".into() },
            Credential::DelegatedTicket {
                principal: "c".into(),
                ticket: vec![1],
            },
        ] {
            match provider.identify(credential).await {
                AuthResult::Success(identity) => {
                    assert!(identity.is_anonymous());
                    assert_eq!(identity.provider, "anonymous");
                }
                other => panic!("unexpected: {:?}", other),
            }
        }
    }
}
