//! PostgreSQL authentication exchange
//!
//! Drives the method configured on the `AuthGateway` over the wire and hands
//! the verified credential to the identity provider.

use super::messages::PgFramed;
use crate::auth::{AuthGateway, AuthMethodKind};
use crate::pg_wire::protocol::{BackendMessage, FrontendMessage};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use pgbridge_common::{BridgeError, Credential, Identity, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Read the client's PasswordMessage / GSSResponse payload
async fn read_password_message<S>(framed: &mut PgFramed<S>) -> Result<Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match framed.next().await {
        Some(Ok(FrontendMessage::Password(payload))) => Ok(payload),
        Some(Ok(other)) => Err(BridgeError::protocol(format!(
            "expected password response, got message type '{}'",
            other.tag() as char
        ))),
        Some(Err(e)) => Err(e.into()),
        None => Err(BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "client closed the connection during authentication",
        ))),
    }
}

/// Run the authentication exchange for `user`.
///
/// On success nothing has been sent yet beyond the method's own requests; the
/// caller sends AuthenticationOk and the session parameters.
pub(crate) async fn perform_auth<S>(framed: &mut PgFramed<S>, auth: &AuthGateway, user: &str) -> Result<Identity>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let credential = match auth.method() {
        AuthMethodKind::NoPassword => Credential::Anonymous { user: user.to_string() },
        AuthMethodKind::Password => {
            framed.send(BackendMessage::AuthenticationCleartextPassword).await?;
            debug!(user = %user, "Sent cleartext auth request");

            let payload = read_password_message(framed).await?;
            let raw = payload.strip_suffix(b"\0").unwrap_or(&payload);
            let password = std::str::from_utf8(raw)
                .map_err(|_| BridgeError::protocol("password is not valid UTF-8"))?;

            if !auth.verify_password(user, password) {
                warn!(user = %user, "Password authentication failed");
                return Err(BridgeError::bad_password(user));
            }
            Credential::Password { user: user.to_string() }
        }
        AuthMethodKind::DelegatedTicket => {
            framed.send(BackendMessage::AuthenticationGss).await?;
            debug!(user = %user, "Sent GSS auth request");

            let token = read_password_message(framed).await?;
            if token.is_empty() {
                return Err(BridgeError::auth("GSS authentication failed: empty token"));
            }
            let accepted = auth.accept_ticket(&token).await?;
            if let Some(reply) = accepted.output_token {
                framed
                    .send(BackendMessage::AuthenticationGssContinue(Bytes::from(reply)))
                    .await?;
            }
            Credential::DelegatedTicket {
                principal: accepted.principal,
                ticket: token.to_vec(),
            }
        }
    };

    let identity = auth.identify(credential).await.into_result()?;
    info!(
        user = %user,
        identity = %identity.name,
        kind = %identity.kind,
        provider = %identity.provider,
        "Client authenticated"
    );
    Ok(identity)
}
