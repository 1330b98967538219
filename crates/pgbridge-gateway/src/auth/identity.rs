//! Authentication outcomes

use pgbridge_common::{BridgeError, Identity};

/// Result of an authentication attempt
#[derive(Debug, Clone)]
pub enum AuthResult {
    /// Authentication successful
    Success(Identity),
    /// The credential was rejected
    InvalidCredentials(String),
    /// The provider could not process the credential
    ProviderError(String),
}

impl AuthResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthResult::Success(_))
    }

    /// Convert into the identity or the error reported to the client
    pub fn into_result(self) -> Result<Identity, BridgeError> {
        match self {
            AuthResult::Success(identity) => Ok(identity),
            AuthResult::InvalidCredentials(msg) | AuthResult::ProviderError(msg) => Err(BridgeError::auth(msg)),
        }
    }
}
