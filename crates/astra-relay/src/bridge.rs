//! Upstream bridge task — one long-lived connection to the hand-tracking
//! service per session.
//!
//! The bridge holds the user ID and the registry handle, never the client
//! transport; delivery is always resolved through the registry, so a client
//! that vanished mid-stream is a counted miss rather than a crash. The
//! cancellation token is observed at every loop iteration — teardown never
//! depends on the upstream socket raising.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use metrics::counter;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use astra_core::ids::UserId;

use crate::metrics::{FRAMES_RELAYED_TOTAL, UPSTREAM_CONNECT_FAILURES_TOTAL};
use crate::registry::{ConnectionRegistry, DeliverError};

/// Why the bridge loop ended. All of these are handled by the owning
/// session; none is fatal beyond the session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeExit {
    /// The session cancelled the bridge; the upstream socket was closed
    /// before exit.
    Cancelled,
    /// The tracking service closed the stream.
    UpstreamClosed,
    /// The upstream transport errored mid-stream.
    UpstreamError {
        /// Transport error description.
        reason: String,
    },
}

/// Connect-phase failure. Terminal for the session — an unreachable tracking
/// backend is reported upward by closing the client connection, not retried
/// behind its back.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// TCP/WebSocket handshake with the tracking service failed.
    #[error("upstream connect to {url} failed: {reason}")]
    ConnectFailed {
        /// Endpoint that refused us.
        url: String,
        /// Handshake error description.
        reason: String,
    },

    /// The tracking service did not complete the handshake within the bound.
    #[error("upstream connect to {url} timed out")]
    ConnectTimedOut {
        /// Endpoint that never answered.
        url: String,
    },
}

/// Pumps landmark frames from the tracking service into the registry.
pub struct UpstreamBridge {
    user_id: UserId,
    upstream_url: String,
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
    connect_timeout: Duration,
}

impl UpstreamBridge {
    /// Build a bridge for one session.
    pub fn new(
        user_id: UserId,
        upstream_url: String,
        registry: Arc<ConnectionRegistry>,
        cancel: CancellationToken,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            user_id,
            upstream_url,
            registry,
            cancel,
            connect_timeout,
        }
    }

    /// Connect and pump until cancelled or the upstream goes away.
    ///
    /// Frames are delivered one at a time in arrival order; a delivery miss
    /// (client already gone) is logged and metered, never aborts the pump.
    #[instrument(skip_all, fields(user_id = %self.user_id))]
    pub async fn run(self) -> Result<BridgeExit, BridgeError> {
        let connect = tokio::time::timeout(
            self.connect_timeout,
            connect_async(self.upstream_url.as_str()),
        );
        let connected = tokio::select! {
            () = self.cancel.cancelled() => None,
            res = connect => Some(res),
        };
        let mut ws = match connected {
            None => return Ok(BridgeExit::Cancelled),
            Some(Err(_elapsed)) => {
                counter!(UPSTREAM_CONNECT_FAILURES_TOTAL).increment(1);
                return Err(BridgeError::ConnectTimedOut {
                    url: self.upstream_url,
                });
            }
            Some(Ok(Err(e))) => {
                counter!(UPSTREAM_CONNECT_FAILURES_TOTAL).increment(1);
                return Err(BridgeError::ConnectFailed {
                    url: self.upstream_url,
                    reason: e.to_string(),
                });
            }
            Some(Ok(Ok((ws, _response)))) => ws,
        };

        info!(url = %self.upstream_url, "connected to tracking service");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(BridgeExit::Cancelled);
                }
                msg = ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            counter!(FRAMES_RELAYED_TOTAL).increment(1);
                            if let Err(DeliverError::NotFound) =
                                self.registry.deliver(self.user_id, text.as_str().to_owned())
                            {
                                // Client gone, stream not: the client's own
                                // disconnect tears the session down shortly.
                                debug!("landmark frame arrived after client left");
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Ok(BridgeExit::UpstreamClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Ok(BridgeExit::UpstreamError {
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}
