//! Process-wide connection registry.
//!
//! The single resource shared across sessions: a map from user identity to
//! that user's live [`RelaySession`]. Sharded locking (`DashMap`) means
//! operations on different users never block each other, while register and
//! remove on the same user are mutually exclusive.
//!
//! The registry is an injected `Arc`, never a process global — constructors
//! take it explicitly, and tests get a fresh one each.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use tracing::debug;

use astra_core::ids::{ConnectionId, UserId};

use crate::metrics::DELIVERY_MISSES_TOTAL;
use crate::session::RelaySession;

/// Delivery failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliverError {
    /// No live session for the user. Expected and non-fatal: an upstream
    /// bridge may outlive a just-closed client by a message.
    #[error("no live session for user")]
    NotFound,
}

/// `UserId` → live [`RelaySession`], at most one per user.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<UserId, Arc<RelaySession>>,
}

impl ConnectionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the session for its user.
    ///
    /// Returns the evicted prior session, if any. The registry never touches
    /// transports — closing the evicted session is the caller's job, so a
    /// hand-off has no hidden side effects.
    pub fn register(&self, session: Arc<RelaySession>) -> Option<Arc<RelaySession>> {
        let user_id = session.user_id();
        let prior = self.sessions.insert(user_id, session);
        if prior.is_some() {
            debug!(%user_id, "replaced existing session for user");
        }
        prior
    }

    /// Remove the user's entry, but only if it is still the given connection.
    ///
    /// Idempotent: a missing entry, or one already replaced by a newer
    /// connection, is a no-op. The connection check is what lets a replaced
    /// session's late teardown run without evicting its replacement.
    pub fn remove(&self, user_id: UserId, connection_id: &ConnectionId) {
        let _ = self
            .sessions
            .remove_if(&user_id, |_, session| {
                session.connection().id() == connection_id
            });
    }

    /// Send a text message to the user's live connection.
    ///
    /// The send itself never blocks (bounded queue, drops counted by the
    /// connection); a missing session is reported as
    /// [`DeliverError::NotFound`] and metered, nothing more.
    pub fn deliver(&self, user_id: UserId, message: String) -> Result<(), DeliverError> {
        match self.sessions.get(&user_id) {
            Some(session) => {
                let _ = session.connection().send(message);
                Ok(())
            }
            None => {
                counter!(DELIVERY_MISSES_TOTAL).increment(1);
                Err(DeliverError::NotFound)
            }
        }
    }

    /// Look up a user's live session.
    pub fn get(&self, user_id: UserId) -> Option<Arc<RelaySession>> {
        self.sessions.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
