//! Prometheus metrics recorder and metric name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across modules.

/// Client connections accepted total (counter).
pub const CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Client disconnections total (counter).
pub const DISCONNECTIONS_TOTAL: &str = "relay_disconnections_total";
/// Live relay sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "relay_sessions_active";
/// Handshakes refused for bad credentials (counter).
pub const AUTH_REFUSALS_TOTAL: &str = "relay_auth_refusals_total";
/// Landmark frames relayed downstream (counter).
pub const FRAMES_RELAYED_TOTAL: &str = "relay_frames_relayed_total";
/// Upstream messages that found no live session (counter).
pub const DELIVERY_MISSES_TOTAL: &str = "relay_delivery_misses_total";
/// Outbound messages dropped on a full client queue (counter).
pub const SEND_DROPS_TOTAL: &str = "relay_send_drops_total";
/// Upstream connect failures, including timeouts (counter).
pub const UPSTREAM_CONNECT_FAILURES_TOTAL: &str = "relay_upstream_connect_failures_total";
/// Session lifetime (histogram, seconds).
pub const SESSION_DURATION_SECONDS: &str = "relay_session_duration_seconds";
