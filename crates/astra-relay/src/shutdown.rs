//! Graceful shutdown coordination via `CancellationToken`.
//!
//! The coordinator owns the root token; every session runs on a child of it,
//! so one `shutdown()` call reaches every receive loop and every upstream
//! bridge without the server tracking them individually.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates graceful shutdown across the server and its sessions.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the root cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Derive a child token for one session. Cancelling the child tears down
    /// that session only; cancelling the root reaches all children.
    pub fn session_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the root token and wait up to `timeout` for the given task
    /// handles to finish. Tasks still running after the bound are left to be
    /// dropped with the runtime.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>, timeout: Duration) {
        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for sessions to drain"
        );

        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some sessions may still be closing");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn shutdown_sets_flag_and_is_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn root_cancellation_reaches_session_tokens() {
        let coord = ShutdownCoordinator::new();
        let s1 = coord.session_token();
        let s2 = coord.session_token();
        assert!(!s1.is_cancelled());
        coord.shutdown();
        assert!(s1.is_cancelled());
        assert!(s2.is_cancelled());
    }

    #[test]
    fn session_cancellation_does_not_reach_root() {
        let coord = ShutdownCoordinator::new();
        let session = coord.session_token();
        session.cancel();
        assert!(!coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_awaits_cooperative_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.session_token();

        let handle = tokio::spawn(async move {
            token.cancelled().await;
        });

        coord.drain(vec![handle], Duration::from_secs(5)).await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_is_bounded_for_stuck_tasks() {
        let coord = ShutdownCoordinator::new();

        // Ignores cancellation entirely.
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        coord.drain(vec![handle], Duration::from_millis(100)).await;
        assert!(coord.is_shutting_down());
    }
}
