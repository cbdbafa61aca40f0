//! Relay session lifecycle — one authenticated client from upgrade through
//! teardown.
//!
//! A session runs as two concurrently scheduled units: the receive loop here
//! (consuming client keep-alive traffic) and the [`UpstreamBridge`] task
//! (pumping inference results back through the registry). They coordinate
//! only through the session's cancellation token and the bridge's join
//! handle — no shared mutable state beyond the registry itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use astra_auth::Identity;
use astra_core::ids::UserId;

use crate::bridge::{BridgeExit, UpstreamBridge};
use crate::config::RelayConfig;
use crate::connection::ClientConnection;
use crate::metrics::{
    CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL, SESSIONS_ACTIVE, SESSION_DURATION_SECONDS,
};
use crate::registry::ConnectionRegistry;

/// How long teardown waits for the bridge task to observe cancellation
/// before aborting it outright.
const BRIDGE_JOIN_GRACE: Duration = Duration::from_secs(5);

/// A client that has shed this many messages is not consuming its stream;
/// treat it as dead rather than relaying into the void.
const DROP_CEILING: u64 = 1024;

/// Where a session is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, bridge not yet launched.
    Connecting,
    /// Both halves running.
    Active,
    /// Teardown initiated by either side.
    Closing,
    /// Fully torn down; registry entry released.
    Closed,
}

/// One user's live real-time interaction.
///
/// Owns the client connection handle and the teardown state machine. The
/// bridge task never holds this struct — it carries the `UserId` only and
/// resolves delivery through the registry.
pub struct RelaySession {
    connection: Arc<ClientConnection>,
    registry: Arc<ConnectionRegistry>,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    started_at: Instant,
}

impl RelaySession {
    /// Create a session in `Connecting`.
    pub fn new(
        connection: Arc<ClientConnection>,
        registry: Arc<ConnectionRegistry>,
    ) -> Arc<Self> {
        Self::with_cancel(connection, registry, CancellationToken::new())
    }

    /// Create a session whose cancellation parents on `cancel` (used to fold
    /// process shutdown into per-session teardown).
    pub fn with_cancel(
        connection: Arc<ClientConnection>,
        registry: Arc<ConnectionRegistry>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection,
            registry,
            state: Mutex::new(SessionState::Connecting),
            cancel,
            started_at: Instant::now(),
        })
    }

    /// The user this session belongs to.
    pub fn user_id(&self) -> UserId {
        self.connection.user_id()
    }

    /// The client connection handle.
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.connection
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Token cancelled when the session starts closing.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `Connecting` → `Active`. Returns `false` if closing already began.
    pub fn activate(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Connecting {
            *state = SessionState::Active;
            true
        } else {
            false
        }
    }

    /// Begin teardown: transition to `Closing` and cancel both units of work.
    ///
    /// Safe to call from either side and any number of times; only the first
    /// call transitions.
    pub fn begin_close(&self) -> bool {
        let transitioned = {
            let mut state = self.state.lock();
            match *state {
                SessionState::Connecting | SessionState::Active => {
                    *state = SessionState::Closing;
                    true
                }
                SessionState::Closing | SessionState::Closed => false,
            }
        };
        if transitioned {
            self.cancel.cancel();
        }
        transitioned
    }

    /// Complete teardown: transition to `Closed` and release the registry
    /// entry.
    ///
    /// Exactly one call performs the removal, no matter how many times (or
    /// from which side) close is driven. Returns whether this call was the
    /// one.
    pub fn finish_close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Closed {
                return false;
            }
            *state = SessionState::Closed;
        }
        self.cancel.cancel();
        self.registry
            .remove(self.connection.user_id(), self.connection.id());
        true
    }
}

/// Run a relay session for an authenticated, upgraded client.
///
/// 1. Splits the socket and spawns the write task (queue drain + pings,
///    closing unresponsive clients)
/// 2. Registers the session, closing any evicted prior session for the user
/// 3. Spawns the upstream bridge and holds its join handle
/// 4. Consumes and discards inbound client traffic (keep-alives only by
///    protocol) until either side closes
/// 5. Tears down: cancel, join the bridge within a grace bound, release the
///    registry entry exactly once
#[instrument(skip_all, fields(user_id = %identity.user_id))]
pub async fn run_session(
    socket: WebSocket,
    identity: Identity,
    registry: Arc<ConnectionRegistry>,
    config: Arc<RelayConfig>,
    shutdown: CancellationToken,
) {
    let user_id = identity.user_id;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (send_tx, mut send_rx) = mpsc::channel::<String>(config.send_queue_depth);
    let connection = Arc::new(ClientConnection::new(user_id, send_tx));
    let session = RelaySession::with_cancel(
        connection.clone(),
        registry.clone(),
        shutdown.child_token(),
    );

    info!(connection_id = %connection.id(), username = %identity.username, "client connected");
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(SESSIONS_ACTIVE).increment(1.0);

    // At most one live session per user: replace, then close what we
    // replaced. The registry hands the prior session back rather than
    // closing anything itself.
    if let Some(prior) = registry.register(session.clone()) {
        info!(prior_connection = %prior.connection().id(), "evicting prior session for user");
        let _ = prior.begin_close();
    }

    // Write task: drains the send queue and pings on an interval. A client
    // that stops ponging past the timeout is treated as dead. On any exit it
    // cancels the session so the receive loop does not linger on a dead
    // socket.
    let outbound_conn = connection.clone();
    let outbound_cancel = session.cancel_token().clone();
    let ping_every = config.heartbeat_interval();
    let pong_timeout = config.heartbeat_timeout();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, closing");
                        break;
                    }
                    if outbound_conn.drop_count() >= DROP_CEILING {
                        warn!(drops = outbound_conn.drop_count(), "client not consuming, closing");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        outbound_cancel.cancel();
    });

    // Launch the bridge; the session owns its handle and joins it on
    // teardown — never fire-and-forget.
    let bridge = UpstreamBridge::new(
        user_id,
        config.upstream_url.clone(),
        registry.clone(),
        session.cancel_token().child_token(),
        config.upstream_connect_timeout(),
    );
    let mut bridge_handle = tokio::spawn(bridge.run());
    let _ = session.activate();

    let cancel = session.cancel_token().clone();
    let mut bridge_result = None;
    loop {
        tokio::select! {
            res = &mut bridge_handle => {
                bridge_result = Some(res);
                break;
            }
            () = cancel.cancelled() => {
                debug!("session cancelled");
                break;
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        connection.mark_alive();
                    }
                    Some(Ok(_)) => {
                        // Keep-alive/control traffic only by protocol; the
                        // relay is unidirectional. Consumed and discarded.
                        connection.mark_alive();
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "client transport error");
                        break;
                    }
                }
            }
        }
    }

    let _ = session.begin_close();

    let bridge_result = match bridge_result {
        Some(res) => Some(res),
        None => match tokio::time::timeout(BRIDGE_JOIN_GRACE, &mut bridge_handle).await {
            Ok(res) => Some(res),
            Err(_) => {
                warn!("bridge ignored cancellation for {BRIDGE_JOIN_GRACE:?}, aborting");
                bridge_handle.abort();
                None
            }
        },
    };
    match bridge_result {
        Some(Ok(Ok(BridgeExit::Cancelled))) => debug!("bridge exited on cancellation"),
        Some(Ok(Ok(BridgeExit::UpstreamClosed))) => info!("upstream closed the stream"),
        Some(Ok(Ok(BridgeExit::UpstreamError { reason }))) => {
            warn!(reason, "upstream transport error");
        }
        Some(Ok(Err(e))) => warn!(error = %e, "upstream bridge failed"),
        Some(Err(e)) if e.is_cancelled() => debug!("bridge task aborted"),
        Some(Err(e)) => warn!(error = %e, "bridge task panicked"),
        None => {}
    }

    let _ = session.finish_close();
    outbound.abort();

    counter!(DISCONNECTIONS_TOTAL).increment(1);
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
    histogram!(SESSION_DURATION_SECONDS).record(session.started_at.elapsed().as_secs_f64());
    info!(drops = connection.drop_count(), "session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_session(
        registry: &Arc<ConnectionRegistry>,
        user: i64,
    ) -> (Arc<RelaySession>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        let connection = Arc::new(ClientConnection::new(UserId::new(user), tx));
        (RelaySession::new(connection, registry.clone()), rx)
    }

    #[tokio::test]
    async fn lifecycle_transitions_in_order() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _rx) = make_session(&registry, 42);

        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.activate());
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.begin_close());
        assert_eq!(session.state(), SessionState::Closing);
        assert!(session.finish_close());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn begin_close_cancels_the_token() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _rx) = make_session(&registry, 42);
        assert!(!session.cancel_token().is_cancelled());
        let _ = session.begin_close();
        assert!(session.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn double_close_removes_exactly_once() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _rx) = make_session(&registry, 42);
        let _ = registry.register(session.clone());
        assert_eq!(registry.len(), 1);

        // Simulate simultaneous client-close and upstream-error: both sides
        // drive the close path.
        assert!(session.begin_close());
        assert!(!session.begin_close());
        assert!(session.finish_close());
        assert!(!session.finish_close());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn close_from_connecting_is_valid() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _rx) = make_session(&registry, 42);
        assert!(session.begin_close());
        assert!(!session.activate());
        assert_eq!(session.state(), SessionState::Closing);
    }

    #[tokio::test]
    async fn finish_close_without_begin_still_removes_once() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _rx) = make_session(&registry, 42);
        let _ = registry.register(session.clone());

        assert!(session.finish_close());
        assert!(registry.is_empty());
        assert!(session.cancel_token().is_cancelled());
        assert!(!session.finish_close());
    }

    #[tokio::test]
    async fn replaced_session_teardown_spares_replacement() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (first, _rx1) = make_session(&registry, 42);
        let (second, _rx2) = make_session(&registry, 42);

        let _ = registry.register(first.clone());
        let evicted = registry.register(second.clone()).unwrap();
        let _ = evicted.begin_close();
        let _ = evicted.finish_close();

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(UserId::new(42)).unwrap().connection().id(),
            second.connection().id()
        );
    }

    #[tokio::test]
    async fn child_token_cancels_with_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (session, _rx) = make_session(&registry, 42);
        let child = session.cancel_token().child_token();
        let _ = session.begin_close();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_parent_cancels_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let shutdown = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(8);
        let connection = Arc::new(ClientConnection::new(UserId::new(42), tx));
        let session =
            RelaySession::with_cancel(connection, registry.clone(), shutdown.child_token());

        shutdown.cancel();
        assert!(session.cancel_token().is_cancelled());
    }
}
