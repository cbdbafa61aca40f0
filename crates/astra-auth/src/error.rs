//! Auth error types.

/// Why a credential was rejected.
///
/// Both variants refuse the real-time handshake before the connection is
/// accepted; neither is ever fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed, unsigned, or expired token.
    #[error("invalid credential: {reason}")]
    InvalidCredential {
        /// What the token check rejected.
        reason: String,
    },

    /// Well-formed token whose subject matches no known account.
    #[error("unknown identity: {subject}")]
    UnknownIdentity {
        /// The token's subject claim.
        subject: String,
    },
}

impl AuthError {
    /// Shorthand for [`AuthError::InvalidCredential`].
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCredential {
            reason: reason.into(),
        }
    }
}
