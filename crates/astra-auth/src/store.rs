//! Subject → identity resolution boundary.
//!
//! The authoritative account store is the platform's relational backend,
//! outside this service. [`UserStore`] is the seam; [`InMemoryUserStore`] is
//! the stand-in used by the binary's users-file mode and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use astra_core::ids::UserId;

/// A resolved platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account primary key.
    pub user_id: UserId,
    /// Account username (the token subject).
    pub username: String,
}

/// Lookup-by-subject over the platform's user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Resolve a token subject to a known account, or `None` if no account
    /// matches.
    async fn resolve_user(&self, subject: &str) -> Option<Identity>;
}

/// Map-backed [`UserStore`].
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, Identity>>,
}

impl InMemoryUserStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an account.
    pub fn insert(&self, identity: Identity) {
        let _ = self
            .users
            .write()
            .insert(identity.username.clone(), identity);
    }

    /// Number of known accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn resolve_user(&self, subject: &str) -> Option<Identity> {
        self.users.read().get(subject).cloned()
    }
}
