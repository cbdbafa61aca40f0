//! JWT verification and signing (HS256).
//!
//! Tokens are issued by the platform's auth subsystem; the relay only ever
//! verifies them. [`sign_token`] exists for the dev-token CLI path and for
//! tests — it is not part of the production handshake.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Registered claims the relay cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the account's username.
    pub sub: String,
    /// Expiry (Unix timestamp, seconds).
    pub exp: i64,
}

/// Validates presented tokens against the shared signing secret.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Build a verifier for HS256 tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        // No clock-skew allowance: a token is expired the second it expires.
        validation.leeway = 0;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Check signature and expiry, returning the claims on success.
    ///
    /// Every failure mode (garbage input, wrong signature, missing claims,
    /// expired token) collapses to [`AuthError::InvalidCredential`] — the
    /// client is told nothing beyond "refused".
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::invalid(e.to_string()))
    }
}

/// Sign a token for `subject` valid for `ttl_secs` from now.
///
/// Dev/test use only — production tokens come from the auth subsystem.
pub fn sign_token(secret: &str, subject: &str, ttl_secs: i64) -> Result<String, AuthError> {
    let claims = Claims {
        sub: subject.to_string(),
        exp: (Utc::now() + Duration::seconds(ttl_secs)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::invalid(e.to_string()))
}
