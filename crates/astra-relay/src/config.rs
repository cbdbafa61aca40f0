//! Relay server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Hand-tracking service WebSocket endpoint.
    pub upstream_url: String,
    /// Bound on the upstream connect phase, in seconds. A session may not sit
    /// in Connecting longer than this.
    pub upstream_connect_timeout_secs: u64,
    /// Interval between server-initiated Ping frames, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close the client after this many seconds without a Pong.
    pub heartbeat_timeout_secs: u64,
    /// Per-client outbound queue depth; sends beyond it are dropped and
    /// counted rather than blocking the bridge.
    pub send_queue_depth: usize,
    /// Bound on graceful shutdown drain, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            upstream_url: "ws://127.0.0.1:8001/ws/track".into(),
            upstream_connect_timeout_secs: 10,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            send_queue_depth: 256,
            shutdown_timeout_secs: 10,
        }
    }
}

impl RelayConfig {
    /// Upstream connect bound as a `Duration`.
    #[must_use]
    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_secs)
    }

    /// Heartbeat ping interval as a `Duration`.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Pong timeout as a `Duration`.
    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Shutdown drain bound as a `Duration`.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
