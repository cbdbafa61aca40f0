//! Client-facing connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use astra_core::ids::{ConnectionId, UserId};

use crate::metrics::SEND_DROPS_TOTAL;

/// The downstream half of a relay session: one connected browser client.
///
/// Sends go through a bounded channel to the socket write task and never
/// block — a slow client sheds messages (counted) instead of stalling the
/// upstream bridge.
pub struct ClientConnection {
    id: ConnectionId,
    user_id: UserId,
    tx: mpsc::Sender<String>,
    connected_at: Instant,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Wrap a freshly upgraded connection's send channel.
    pub fn new(user_id: UserId, tx: mpsc::Sender<String>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            user_id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// This connection's unique ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The authenticated user behind this connection.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Enqueue a text message toward the client.
    ///
    /// Returns `false` when the queue is full or the write task is gone; the
    /// drop is counted either way.
    pub fn send(&self, message: String) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            counter!(SEND_DROPS_TOTAL).increment(1);
            false
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record liveness (any pong or inbound traffic).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the client showed life since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last sign of life.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
