//! WebSocket upgrade handler for `/ws/sensory-gym`.
//!
//! Authentication happens before the upgrade: a missing, invalid, or unknown
//! credential is refused with `401` at the HTTP handshake, so a rejected
//! client never gets a WebSocket that is immediately closed.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde::Deserialize;
use tracing::{info, warn};

use crate::metrics::AUTH_REFUSALS_TOTAL;
use crate::server::AppState;
use crate::session::run_session;

/// Query parameters accepted on the upgrade request.
///
/// Browser WebSocket clients cannot set headers on the handshake, so the
/// credential rides in the query string.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Signed bearer token.
    pub token: Option<String>,
}

/// GET /ws/sensory-gym — authenticate, then upgrade into a relay session.
pub async fn sensory_gym_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(token) = query.token else {
        counter!(AUTH_REFUSALS_TOTAL).increment(1);
        warn!("handshake refused: no token supplied");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let identity = match state.authenticator.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            counter!(AUTH_REFUSALS_TOTAL).increment(1);
            warn!(error = %e, "handshake refused");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    info!(user_id = %identity.user_id, "handshake accepted, upgrading");

    let registry = state.registry.clone();
    let config = state.config.clone();
    let shutdown = state.shutdown.session_token();
    ws.on_upgrade(move |socket| run_session(socket, identity, registry, config, shutdown))
}
