//! Verify-then-resolve authentication for the real-time handshake.

use std::sync::Arc;

use tracing::debug;

use crate::error::AuthError;
use crate::store::{Identity, UserStore};
use crate::token::TokenVerifier;

/// Validates a query-parameter credential and resolves it to an account.
///
/// Failure always means the handshake is refused before the WebSocket is
/// accepted — never accepted and then closed, which would leak partial state
/// to the client.
pub struct Authenticator {
    verifier: TokenVerifier,
    store: Arc<dyn UserStore>,
}

impl Authenticator {
    /// Build an authenticator over the given signing secret and user store.
    #[must_use]
    pub fn new(secret: &str, store: Arc<dyn UserStore>) -> Self {
        Self {
            verifier: TokenVerifier::new(secret),
            store,
        }
    }

    /// Validate `token` and resolve its subject.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.verifier.verify(token)?;
        match self.store.resolve_user(&claims.sub).await {
            Some(identity) => {
                debug!(user_id = %identity.user_id, subject = %claims.sub, "credential accepted");
                Ok(identity)
            }
            None => Err(AuthError::UnknownIdentity {
                subject: claims.sub,
            }),
        }
    }
}
